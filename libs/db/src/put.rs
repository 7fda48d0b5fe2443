//! Put pipeline: streaming ingestion of discovered and known URLs.
//!
//! A put stream is a pair of channels: the caller feeds [`UrlItem`]s into
//! one end and drains acks (the URL string, a liveness signal rather than a
//! success code) from the other. Each item is fully applied to the store and
//! the queue metadata before its ack is emitted.
//!
//! Per-URL faults — malformed URL, oversized key, queue mid-deletion — are
//! logged, acked and dropped. A store failure is logged and the ack withheld
//! so the caller can time out on it.

use tokio::sync::mpsc;
use url::Url;

use crate::schema::{self, Existence, Scheduling};
use crate::service::Frontier;
use crate::{
    normalise_crawl_id, now_epoch_secs, QueueWithinCrawl, UrlInfo, MAX_QUEUE_KEY_LENGTH,
};

/// One item of a put stream.
#[derive(Debug, Clone)]
pub enum UrlItem {
    /// A URL seen for the first time by the crawler. Scheduled immediately
    /// unless the frontier already knows it.
    Discovered { info: UrlInfo },
    /// A URL coming back from a fetch. `refetchable_from` is the epoch
    /// second it becomes fetchable again; `0` means never refetch.
    Known {
        info: UrlInfo,
        refetchable_from: u64,
    },
}

impl UrlItem {
    pub fn info(&self) -> &UrlInfo {
        match self {
            UrlItem::Discovered { info } => info,
            UrlItem::Known { info, .. } => info,
        }
    }
}

/// Configuration for a put stream.
#[derive(Debug, Clone)]
pub struct PutConfig {
    /// Capacity of both the item and the ack channel.
    pub channel_buffer_size: usize,
}

impl Default for PutConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
        }
    }
}

/// The two ends of a put stream handed to the transport.
pub struct PutStream {
    /// Feed items here; dropping the sender ends the stream.
    pub items: mpsc::Sender<UrlItem>,
    /// Acks arrive here, one per accepted-or-dropped item, in item order.
    pub acks: mpsc::Receiver<String>,
}

impl Frontier {
    /// Start a put stream. A consumer task drains the item channel, applies
    /// each item and emits its ack; it exits when the item channel closes or
    /// the ack receiver is dropped.
    pub fn put_urls(&self, config: PutConfig) -> PutStream {
        let (items_tx, mut items_rx) = mpsc::channel::<UrlItem>(config.channel_buffer_size);
        let (acks_tx, acks_rx) = mpsc::channel::<String>(config.channel_buffer_size);

        let frontier = self.clone();
        tokio::spawn(async move {
            while let Some(item) = items_rx.recv().await {
                if let Some(url) = frontier.apply_url_item(item) {
                    if acks_tx.send(url).await.is_err() {
                        // Ack consumer went away; stop silently.
                        return;
                    }
                }
            }
            tracing::debug!("Put stream closed");
        });

        PutStream {
            items: items_tx,
            acks: acks_rx,
        }
    }

    /// Apply a single item. Returns the URL to ack, or `None` when a store
    /// failure means the ack must be withheld.
    fn apply_url_item(&self, item: UrlItem) -> Option<String> {
        let (mut info, discovered, refetchable_from) = match item {
            UrlItem::Discovered { info } => (info, true, 0),
            UrlItem::Known {
                info,
                refetchable_from,
            } => (info, false, refetchable_from),
        };
        let url = info.url.clone();
        let crawl_id = normalise_crawl_id(&info.crawl_id);

        let mut key = info.key.clone();
        if key.is_empty() {
            tracing::debug!(%url, "Queue key missing, deriving from host");
            match host_of(&url) {
                Some(host) => key = host,
                None => {
                    tracing::error!(%url, "Malformed URL");
                    return Some(url);
                }
            }
        }
        if key.len() > MAX_QUEUE_KEY_LENGTH {
            tracing::error!(%key, "Key too long");
            return Some(url);
        }
        // Store the resolved identifiers so consumers see what was used.
        info.key = key.clone();
        info.crawl_id = crawl_id.clone();

        let queue = QueueWithinCrawl { crawl_id, queue: key };
        if self.deleting().contains(&queue) {
            tracing::info!(%url, %queue, "Not adding URL, its queue is being deleted");
            return Some(url);
        }

        let existence_key = schema::existence_key(&queue, &url);
        let prior = match self.storage().get::<Existence>(&existence_key) {
            Ok(prior) => prior,
            Err(e) => {
                tracing::error!(%url, error = %e, "Store read failed");
                return None;
            }
        };

        // Already known and merely re-discovered: nothing to change.
        if prior.is_some() && discovered {
            return Some(url);
        }

        let next_fetch = if discovered {
            now_epoch_secs()
        } else {
            refetchable_from
        };
        let completed = !discovered && next_fetch == 0;
        let prior_scheduling = prior.filter(|value| !value.is_empty());

        let (metadata, _) = self.registry().get_or_insert(&queue);

        if let Err(e) = self.write_url_state(
            &queue,
            &info,
            next_fetch,
            completed,
            &existence_key,
            prior_scheduling.as_deref(),
        ) {
            tracing::error!(%url, error = %e, "Store write failed");
            return None;
        }

        let mut md = metadata.lock().unwrap();
        if prior_scheduling.is_some() {
            md.remove_from_processed(&url);
            md.decrement_active();
        }
        if completed {
            md.increment_completed();
        } else {
            md.increment_active();
        }
        drop(md);

        Some(url)
    }

    /// Write the new durable state of a URL: drop the superseded scheduling
    /// entry, then either mark done (empty existence value, no scheduling
    /// entry) or write the new scheduling entry and point the existence
    /// value at it.
    fn write_url_state(
        &self,
        queue: &QueueWithinCrawl,
        info: &UrlInfo,
        next_fetch: u64,
        completed: bool,
        existence_key: &[u8],
        prior_scheduling: Option<&[u8]>,
    ) -> anyhow::Result<()> {
        if let Some(prior_key) = prior_scheduling {
            self.storage().delete::<Scheduling>(prior_key)?;
        }
        if completed {
            self.storage().put::<Existence>(existence_key, b"")?;
        } else {
            let scheduling_key = schema::scheduling_key(queue, next_fetch, &info.url);
            let value = schema::url_info_to_bytes(info)?;
            self.storage().put::<Scheduling>(&scheduling_key, &value)?;
            self.storage().put::<Existence>(existence_key, &scheduling_key)?;
        }
        Ok(())
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_string()))
}
