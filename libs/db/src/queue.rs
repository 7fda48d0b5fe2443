//! Per-queue scheduling metadata: counts plus the in-flight hold table.

use std::collections::HashMap;

/// In-memory record for one queue: how many URLs are scheduled (`active`),
/// how many are done (`completed`), and which URLs are temporarily held
/// because they were just handed to a crawler.
///
/// Access runs under the registry's per-queue mutex; the methods here assume
/// the caller already holds it. Dispatch must check [`is_held`] and call
/// [`hold_until`] without releasing that lock in between, otherwise two
/// concurrent gets can emit the same URL.
///
/// [`is_held`]: QueueMetadata::is_held
/// [`hold_until`]: QueueMetadata::hold_until
#[derive(Debug, Default)]
pub struct QueueMetadata {
    active: u64,
    completed: u64,
    /// URL → earliest epoch seconds at which it may be handed out again.
    held: HashMap<String, u64>,
}

impl QueueMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_active(&mut self) {
        self.active += 1;
    }

    pub fn decrement_active(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    pub fn increment_completed(&mut self) {
        self.completed += 1;
    }

    /// Overwrite both counters. Recovery rebuilds them from the store.
    pub(crate) fn set_counts(&mut self, active: u64, completed: u64) {
        self.active = active;
        self.completed = completed;
    }

    /// Record that `url` may not be handed out again before `deadline`.
    pub fn hold_until(&mut self, url: &str, deadline: u64) {
        self.held.insert(url.to_string(), deadline);
    }

    /// Whether `url` is currently held. Expired entries are purged as they
    /// are encountered so the table tracks only live claims.
    pub fn is_held(&mut self, url: &str, now: u64) -> bool {
        match self.held.get(url) {
            Some(&deadline) if deadline > now => true,
            Some(_) => {
                self.held.remove(url);
                false
            }
            None => false,
        }
    }

    /// Drop any hold on `url`. Called when the URL's fetch outcome arrives.
    pub fn remove_from_processed(&mut self, url: &str) {
        self.held.remove(url);
    }

    /// Number of unexpired holds, purging expired entries along the way.
    pub fn in_process(&mut self, now: u64) -> u64 {
        self.held.retain(|_, &mut deadline| deadline > now);
        self.held.len() as u64
    }

    pub fn count_active(&self) -> u64 {
        self.active
    }

    pub fn count_completed(&self) -> u64 {
        self.completed
    }

    /// Total URLs this queue has ever accepted and still remembers.
    pub fn size(&self) -> u64 {
        self.active + self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_increments() {
        let mut md = QueueMetadata::new();
        md.increment_active();
        md.increment_active();
        md.increment_completed();
        assert_eq!(md.count_active(), 2);
        assert_eq!(md.count_completed(), 1);
        assert_eq!(md.size(), 3);

        md.decrement_active();
        assert_eq!(md.count_active(), 1);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let mut md = QueueMetadata::new();
        md.decrement_active();
        assert_eq!(md.count_active(), 0);
    }

    #[test]
    fn holds_expire_and_purge_lazily() {
        let mut md = QueueMetadata::new();
        md.hold_until("http://a/x", 100);

        assert!(md.is_held("http://a/x", 99));
        // Deadline reached: no longer held, entry evicted.
        assert!(!md.is_held("http://a/x", 100));
        assert_eq!(md.in_process(100), 0);
    }

    #[test]
    fn remove_from_processed_clears_hold() {
        let mut md = QueueMetadata::new();
        md.hold_until("http://a/x", u64::MAX);
        md.remove_from_processed("http://a/x");
        assert!(!md.is_held("http://a/x", 0));
    }

    #[test]
    fn in_process_counts_only_unexpired() {
        let mut md = QueueMetadata::new();
        md.hold_until("http://a/1", 50);
        md.hold_until("http://a/2", 150);
        assert_eq!(md.in_process(100), 1);
    }
}
