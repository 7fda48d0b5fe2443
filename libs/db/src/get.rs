//! Get pipeline: fair round-robin dispatch of due URLs.
//!
//! A get call produces a stream of [`UrlInfo`] over a channel. The dispatch
//! task sweeps the queue rotation once, starting at the registry cursor and
//! advancing it for every queue visited, so repeated calls let every queue
//! lead eventually. Within a queue, the scheduling family is scanned forward
//! from the queue prefix: entries are in next-fetch order, so the scan stops
//! at the first future entry.
//!
//! Emitting a URL places a hold — an in-memory claim that later calls skip
//! until the deadline passes. The store is not touched; a crash simply makes
//! held URLs available again.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::queue::QueueMetadata;
use crate::schema::{self, Scheduling};
use crate::service::Frontier;
use crate::{now_epoch_secs, QueueWithinCrawl, UrlInfo};

/// Hold duration applied when a request does not specify one.
pub const DEFAULT_DELAY_REQUESTABLE_SECS: u64 = 30;

/// Parameters of a get call. Zero means "unlimited" for the two caps and
/// "default" for the delay.
#[derive(Debug, Clone, Default)]
pub struct GetParams {
    /// Maximum number of queues that may contribute URLs; 0 is unlimited.
    pub max_queues: u32,
    /// Maximum URLs emitted per queue; 0 is unlimited.
    pub max_urls_per_queue: u32,
    /// Seconds an emitted URL stays held; 0 applies the default.
    pub delay_requestable: u32,
    /// When non-empty, serve only this queue (with `crawl_id`) and leave the
    /// round-robin cursor untouched.
    pub key: String,
    pub crawl_id: String,
}

impl Frontier {
    /// Start a get stream. URLs arrive on the returned channel; the stream
    /// ends when the sweep completes, the caller drops the receiver, or a
    /// store error cuts it short.
    pub fn get_urls(&self, params: GetParams, buffer: usize) -> mpsc::Receiver<UrlInfo> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let frontier = self.clone();
        tokio::spawn(async move {
            frontier.dispatch(params, tx).await;
        });
        rx
    }

    #[tracing::instrument(skip(self, tx))]
    async fn dispatch(&self, params: GetParams, tx: mpsc::Sender<UrlInfo>) {
        let max_queues: u64 = match params.max_queues {
            0 => u64::MAX,
            n => n as u64,
        };
        let max_urls_per_queue: u64 = match params.max_urls_per_queue {
            0 => u64::MAX,
            n => n as u64,
        };
        let delay: u64 = match params.delay_requestable {
            0 => DEFAULT_DELAY_REQUESTABLE_SECS,
            n => n as u64,
        };
        let now = now_epoch_secs();

        // A specific queue was requested: serve it alone, no rotation.
        if !params.key.is_empty() {
            let queue = QueueWithinCrawl::new(&params.crawl_id, &params.key);
            let Some(metadata) = self.registry().get(&queue) else {
                return;
            };
            let sent = self
                .send_urls_for_queue(&metadata, &queue, max_urls_per_queue, delay, now, &tx)
                .await
                .unwrap_or(0);
            tracing::debug!(%queue, sent, "Served targeted get");
            return;
        }

        let mut queues_sent: u64 = 0;
        let mut total_sent: u64 = 0;
        for _ in 0..self.registry().len() {
            if queues_sent >= max_queues {
                break;
            }
            let Some(queue) = self.registry().next_key() else {
                break;
            };
            self.registry().advance();
            // The queue may have been deleted since the rotation snapshot.
            let Some(metadata) = self.registry().get(&queue) else {
                continue;
            };
            match self
                .send_urls_for_queue(&metadata, &queue, max_urls_per_queue, delay, now, &tx)
                .await
            {
                Ok(sent) => {
                    if sent > 0 {
                        total_sent += sent;
                        queues_sent += 1;
                    }
                }
                // Client gone or store error: the stream is over either way.
                Err(_) => return,
            }
        }
        tracing::debug!(total_sent, queues_sent, "Dispatch sweep finished");
    }

    /// Scan one queue and emit its due URLs. Returns how many were emitted,
    /// or an error when the stream must end (store failure, disconnect).
    async fn send_urls_for_queue(
        &self,
        metadata: &Arc<Mutex<QueueMetadata>>,
        queue: &QueueWithinCrawl,
        max_urls: u64,
        delay: u64,
        now: u64,
        tx: &mpsc::Sender<UrlInfo>,
    ) -> anyhow::Result<u64> {
        // Collect the batch synchronously: holds are placed under the queue
        // lock as each entry is claimed, so a concurrent get cannot claim
        // the same URL between check and set.
        let batch = {
            let prefix = schema::queue_prefix(queue);
            let mut batch: Vec<UrlInfo> = Vec::new();
            let iter = match self.storage().iter_from::<Scheduling>(&prefix) {
                Ok(iter) => iter,
                Err(e) => {
                    tracing::error!(%queue, error = %e, "Store scan failed");
                    return Err(e);
                }
            };
            for entry in iter {
                if batch.len() as u64 >= max_urls {
                    break;
                }
                let (key, value) = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::error!(%queue, error = %e, "Store scan failed");
                        return Err(e);
                    }
                };
                let parsed = match schema::parse_scheduling_key(&key) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!(%queue, error = %e, "Unparseable scheduling key");
                        break;
                    }
                };
                // Ran past this queue's prefix: done.
                if parsed.queue != *queue {
                    break;
                }
                // Entries are date-ordered; the first future one ends the scan.
                if parsed.next_fetch > now {
                    break;
                }
                let info = match schema::url_info_from_bytes(&value) {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::warn!(url = %parsed.url, error = %e, "Skipping undecodable entry");
                        continue;
                    }
                };
                let mut md = metadata.lock().unwrap();
                if md.is_held(&parsed.url, now) {
                    continue;
                }
                md.hold_until(&parsed.url, now + delay);
                drop(md);
                batch.push(info);
            }
            batch
        };

        let mut sent = 0u64;
        for info in batch {
            if tx.send(info).await.is_err() {
                // Receiver dropped; stop emitting, holds simply decay.
                anyhow::bail!("get stream receiver dropped");
            }
            sent += 1;
        }
        Ok(sent)
    }
}
