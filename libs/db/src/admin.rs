//! Admin operations: queue listing, stats, and bulk deletion.
//!
//! Deletion works on byte ranges: a queue's keys in both families share its
//! prefix, so removing `[prefix(q), prefix(next_q))` — where `next_q` is the
//! next queue in sorted order, or the end of the family when there is none —
//! removes the queue wholesale. A queue being torn down sits in the
//! `deleting` set so concurrent puts drop their items instead of resurrecting
//! it mid-delete.

use std::collections::HashMap;

use anyhow::Result;

use crate::schema::{self, Existence, Scheduling};
use crate::service::Frontier;
use crate::store::ColumnFamily;
use crate::{normalise_crawl_id, now_epoch_secs, QueueWithinCrawl};

/// Aggregate counters over one queue or all of them.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub number_of_queues: u64,
    /// Total URLs known (active + completed) across the selected queues.
    pub size: u64,
    /// URLs currently held (handed out, deadline not yet passed).
    pub in_process: u64,
    /// Census of the selected queues' entries by state.
    pub counts: HashMap<String, u64>,
}

impl Frontier {
    /// Identifiers of queues whose head entry is due, up to `max_queues`
    /// (0 means no limit).
    pub fn list_queues(&self, max_queues: u32) -> Result<Vec<String>> {
        let max = match max_queues {
            0 => usize::MAX,
            n => n as usize,
        };
        let now = now_epoch_secs();
        let mut due = Vec::new();
        for queue in self.registry().keys() {
            if due.len() >= max {
                break;
            }
            if self.head_is_dispatchable(&queue, now)? {
                due.push(queue.queue.clone());
            }
        }
        Ok(due)
    }

    fn head_is_dispatchable(&self, queue: &QueueWithinCrawl, now: u64) -> Result<bool> {
        let prefix = schema::queue_prefix(queue);
        let mut iter = self.storage().iter_from::<Scheduling>(&prefix)?;
        match iter.next() {
            Some(entry) => {
                let (key, _) = entry?;
                let Ok(parsed) = schema::parse_scheduling_key(&key) else {
                    return Ok(false);
                };
                Ok(parsed.queue == *queue && parsed.next_fetch <= now)
            }
            None => Ok(false),
        }
    }

    /// Counters for one queue, or across all queues when `queue` is `None`.
    pub fn get_stats(&self, queue: Option<&QueueWithinCrawl>) -> Result<Stats> {
        if let Some(statistics) = self.storage().statistics() {
            tracing::info!("Store statistics:\n{statistics}");
        }

        let selected: Vec<QueueWithinCrawl> = match queue {
            Some(queue) if self.registry().contains(queue) => vec![queue.clone()],
            Some(_) => Vec::new(),
            None => self.registry().keys(),
        };
        let now = now_epoch_secs();

        let mut stats = Stats {
            number_of_queues: selected.len() as u64,
            ..Default::default()
        };
        stats.counts.insert("scheduled".to_string(), 0);
        stats.counts.insert("held".to_string(), 0);
        stats.counts.insert("completed".to_string(), 0);

        for queue in &selected {
            let Some(metadata) = self.registry().get(queue) else {
                continue;
            };
            {
                let mut md = metadata.lock().unwrap();
                stats.size += md.size();
                stats.in_process += md.in_process(now);
                *stats.counts.get_mut("completed").unwrap() += md.count_completed();
            }

            // Census of the scheduling entries: held or merely scheduled.
            let prefix = schema::queue_prefix(queue);
            for entry in self.storage().iter_from::<Scheduling>(&prefix)? {
                let (key, _) = entry?;
                let Ok(parsed) = schema::parse_scheduling_key(&key) else {
                    break;
                };
                if parsed.queue != *queue {
                    break;
                }
                let held = metadata.lock().unwrap().is_held(&parsed.url, now);
                let bucket = if held { "held" } else { "scheduled" };
                *stats.counts.get_mut(bucket).unwrap() += 1;
            }
        }
        Ok(stats)
    }

    /// Remove a queue from both families and the registry. Returns the
    /// number of URLs removed; a queue mid-deletion or already gone counts
    /// zero, making the call idempotent.
    pub fn delete_queue(&self, queue: &QueueWithinCrawl) -> Result<u64> {
        if self.deleting().contains(queue) || !self.registry().contains(queue) {
            return Ok(0);
        }
        self.deleting().insert(queue.clone());
        // Unmark only once the registry entry is gone, so a concurrent put
        // cannot repopulate the just-emptied range.
        let result = self.delete_queue_ranges(queue);
        let removed = match &result {
            Ok(()) => self
                .registry()
                .remove(queue)
                .map(|metadata| metadata.lock().unwrap().size())
                .unwrap_or(0),
            Err(_) => 0,
        };
        self.deleting().remove(queue);
        result?;

        tracing::info!(%queue, removed, "Deleted queue");
        Ok(removed)
    }

    fn delete_queue_ranges(&self, queue: &QueueWithinCrawl) -> Result<()> {
        let start = schema::queue_prefix(queue);
        let mut keys = self.registry().keys();
        keys.sort();
        let end = keys
            .iter()
            .position(|candidate| candidate == queue)
            .and_then(|position| keys.get(position + 1))
            .map(schema::queue_prefix);
        self.delete_ranges(&start, end)
    }

    /// Remove every queue of a crawl. Returns the number of URLs removed.
    pub fn delete_crawl(&self, crawl_id: &str) -> Result<u64> {
        let crawl_id = normalise_crawl_id(crawl_id);

        let mut keys = self.registry().keys();
        keys.sort();
        let to_delete: Vec<QueueWithinCrawl> = keys
            .iter()
            .filter(|queue| queue.crawl_id == crawl_id)
            .cloned()
            .collect();
        if to_delete.is_empty() {
            return Ok(0);
        }

        for queue in &to_delete {
            self.deleting().insert(queue.clone());
        }
        let start = schema::crawl_prefix(&crawl_id);
        let end = keys
            .iter()
            .find(|queue| queue.crawl_id > crawl_id)
            .map(|queue| schema::crawl_prefix(&queue.crawl_id));
        let result = self.delete_ranges(&start, end);

        let mut total = 0;
        if result.is_ok() {
            for queue in &to_delete {
                if let Some(metadata) = self.registry().remove(queue) {
                    total += metadata.lock().unwrap().size();
                }
            }
        }
        for queue in &to_delete {
            self.deleting().remove(queue);
        }
        result?;
        tracing::info!(crawl = %crawl_id, removed = total, "Deleted crawl");
        Ok(total)
    }

    fn delete_ranges(&self, start: &[u8], end: Option<Vec<u8>>) -> Result<()> {
        match end {
            Some(end) => {
                self.storage().delete_range::<Scheduling>(start, &end)?;
                self.storage().delete_range::<Existence>(start, &end)?;
            }
            None => {
                // No later queue to bound the range: bound each family by
                // its own last key.
                self.delete_to_family_end::<Scheduling>(start)?;
                self.delete_to_family_end::<Existence>(start)?;
            }
        }
        Ok(())
    }

    fn delete_to_family_end<C: ColumnFamily>(&self, start: &[u8]) -> Result<()> {
        if let Some(mut end) = self.storage().last_key::<C>()? {
            // One past the last key makes the half-open range inclusive.
            end.push(0);
            self.storage().delete_range::<C>(start, &end)?;
        }
        Ok(())
    }
}
