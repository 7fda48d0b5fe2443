//! Rotating registry of queues: insertion order, O(1) lookup by identifier,
//! and a cursor for round-robin dispatch.
//!
//! A concurrent linked map would do, but the dispatch loop needs to rotate
//! from head to tail while ingest inserts at the back, so the registry keeps
//! an explicit order vector next to the index. One mutex guards order, index
//! membership and cursor together; it is held only for the duration of a map
//! operation or a cursor step, never across a store call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::queue::QueueMetadata;
use crate::QueueWithinCrawl;

type SharedMetadata = Arc<Mutex<QueueMetadata>>;

#[derive(Default)]
struct Inner {
    order: Vec<QueueWithinCrawl>,
    index: HashMap<QueueWithinCrawl, SharedMetadata>,
    cursor: usize,
}

/// Ordered, rotating collection of queues.
#[derive(Default)]
pub struct QueueRegistry {
    inner: Mutex<Inner>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `queue`, if registered.
    pub fn get(&self, queue: &QueueWithinCrawl) -> Option<SharedMetadata> {
        let inner = self.inner.lock().unwrap();
        inner.index.get(queue).cloned()
    }

    /// Whether `queue` is registered.
    pub fn contains(&self, queue: &QueueWithinCrawl) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.index.contains_key(queue)
    }

    /// Metadata for `queue`, creating and appending the queue to the
    /// rotation if it was unknown. Returns the metadata and whether the
    /// queue was newly registered.
    pub fn get_or_insert(&self, queue: &QueueWithinCrawl) -> (SharedMetadata, bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.index.get(queue) {
            return (existing.clone(), false);
        }
        let metadata = Arc::new(Mutex::new(QueueMetadata::new()));
        inner.index.insert(queue.clone(), metadata.clone());
        inner.order.push(queue.clone());
        (metadata, true)
    }

    /// Remove `queue` from the index and the rotation, returning its
    /// metadata. The cursor is adjusted so rotation continues from the same
    /// logical position.
    pub fn remove(&self, queue: &QueueWithinCrawl) -> Option<SharedMetadata> {
        let mut inner = self.inner.lock().unwrap();
        let metadata = inner.index.remove(queue)?;
        if let Some(position) = inner.order.iter().position(|q| q == queue) {
            inner.order.remove(position);
            if position < inner.cursor {
                inner.cursor -= 1;
            }
        }
        Some(metadata)
    }

    /// Snapshot of the rotation order. A copy: iterating it holds no lock,
    /// so the content may trail concurrent changes.
    pub fn keys(&self) -> Vec<QueueWithinCrawl> {
        let inner = self.inner.lock().unwrap();
        inner.order.clone()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The queue currently at the cursor, if any.
    pub fn next_key(&self) -> Option<QueueWithinCrawl> {
        let mut inner = self.inner.lock().unwrap();
        if inner.order.is_empty() {
            return None;
        }
        if inner.cursor >= inner.order.len() {
            inner.cursor = 0;
        }
        Some(inner.order[inner.cursor].clone())
    }

    /// Advance the cursor one position, wrapping at the end.
    pub fn advance(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.order.is_empty() {
            inner.cursor = 0;
            return;
        }
        inner.cursor = (inner.cursor + 1) % inner.order.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str) -> QueueWithinCrawl {
        QueueWithinCrawl::new("DEFAULT", name)
    }

    #[test]
    fn get_or_insert_reports_newness() {
        let registry = QueueRegistry::new();
        let (_, was_new) = registry.get_or_insert(&q("a"));
        assert!(was_new);
        let (_, was_new) = registry.get_or_insert(&q("a"));
        assert!(!was_new);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let registry = QueueRegistry::new();
        for name in ["c", "a", "b"] {
            registry.get_or_insert(&q(name));
        }
        assert_eq!(registry.keys(), vec![q("c"), q("a"), q("b")]);
    }

    #[test]
    fn cursor_rotates_and_wraps() {
        let registry = QueueRegistry::new();
        registry.get_or_insert(&q("a"));
        registry.get_or_insert(&q("b"));

        assert_eq!(registry.next_key(), Some(q("a")));
        registry.advance();
        assert_eq!(registry.next_key(), Some(q("b")));
        registry.advance();
        assert_eq!(registry.next_key(), Some(q("a")));
    }

    #[test]
    fn remove_adjusts_cursor() {
        let registry = QueueRegistry::new();
        for name in ["a", "b", "c"] {
            registry.get_or_insert(&q(name));
        }
        registry.advance();
        registry.advance();
        // Cursor on "c"; removing "a" shifts the order left underneath it.
        registry.remove(&q("a"));
        assert_eq!(registry.next_key(), Some(q("c")));
    }

    #[test]
    fn remove_last_queue_empties_rotation() {
        let registry = QueueRegistry::new();
        registry.get_or_insert(&q("a"));
        assert!(registry.remove(&q("a")).is_some());
        assert!(registry.remove(&q("a")).is_none());
        assert_eq!(registry.next_key(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_metadata_is_the_same_instance() {
        let registry = QueueRegistry::new();
        let (md, _) = registry.get_or_insert(&q("a"));
        md.lock().unwrap().increment_active();
        let again = registry.get(&q("a")).unwrap();
        assert_eq!(again.lock().unwrap().count_active(), 1);
    }
}
