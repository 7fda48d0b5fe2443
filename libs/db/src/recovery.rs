//! Startup reconstruction of in-memory queue state from the durable store.
//!
//! The existence family is authoritative: a non-empty value means the URL is
//! scheduled, an empty value means it is completed. The scheduling family is
//! walked first to rebuild the queue set and to collect per-queue entry
//! counts, which are then cross-checked against the existence-derived active
//! counts at every queue boundary. Any mismatch means the two families have
//! diverged and the service refuses to start.

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::registry::QueueRegistry;
use crate::schema::{self, Existence, Scheduling};
use crate::store::Storage;
use crate::QueueWithinCrawl;

/// Scan both families and rebuild `registry`. Fails fast on inconsistency.
pub(crate) fn recover(storage: &Storage, registry: &QueueRegistry) -> Result<()> {
    // Queue set and scheduled-entry counts from the scheduling family.
    let mut scheduled_counts: HashMap<QueueWithinCrawl, u64> = HashMap::new();
    for entry in storage.iter_from::<Scheduling>(b"")? {
        let (key, _) = entry?;
        let queue = schema::parse_queue(&key)?;
        registry.get_or_insert(&queue);
        *scheduled_counts.entry(queue).or_insert(0) += 1;
    }

    // Authoritative counts from the existence family. Keys sharing a queue
    // prefix are contiguous, so a change of parsed queue is a boundary.
    let mut current: Option<(QueueWithinCrawl, u64, u64)> = None;
    for entry in storage.iter_from::<Existence>(b"")? {
        let (key, value) = entry?;
        let queue = schema::parse_queue(&key)?;
        match &mut current {
            Some((q, active, completed)) if *q == queue => {
                if value.is_empty() {
                    *completed += 1;
                } else {
                    *active += 1;
                }
            }
            slot => {
                if let Some((q, active, completed)) = slot.take() {
                    finish_queue(registry, &mut scheduled_counts, q, active, completed)?;
                }
                let (active, completed) = if value.is_empty() { (0, 1) } else { (1, 0) };
                *slot = Some((queue, active, completed));
            }
        }
    }
    if let Some((q, active, completed)) = current.take() {
        finish_queue(registry, &mut scheduled_counts, q, active, completed)?;
    }

    // Scheduling entries whose queue never appeared in the existence family
    // are orphans; the store is inconsistent.
    if let Some((queue, count)) = scheduled_counts.iter().find(|(_, count)| **count > 0) {
        bail!("{count} scheduling entries without existence entries for queue {queue}");
    }

    Ok(())
}

fn finish_queue(
    registry: &QueueRegistry,
    scheduled_counts: &mut HashMap<QueueWithinCrawl, u64>,
    queue: QueueWithinCrawl,
    active: u64,
    completed: u64,
) -> Result<()> {
    let scheduled = scheduled_counts.remove(&queue).unwrap_or(0);
    if active != scheduled {
        bail!(
            "Incorrect number of active URLs for queue {queue}: \
             {active} scheduled per the existence family, {scheduled} scheduling entries"
        );
    }
    let (metadata, _) = registry.get_or_insert(&queue);
    metadata.lock().unwrap().set_counts(active, completed);
    tracing::debug!(%queue, active, completed, "Recovered queue");
    Ok(())
}
