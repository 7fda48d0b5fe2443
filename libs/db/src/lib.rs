//! Persistent URL frontier: accepts discovered and refetch-ready URLs from
//! crawlers, durably records their scheduling state in RocksDB, and hands
//! URLs back out under politeness and ordering constraints.
//!
//! The frontier keeps two keyspaces (see [`schema`]): an existence family
//! recording every URL ever seen per queue, and a scheduling family ordered
//! by next-fetch date. In-memory [`QueueMetadata`] tracks per-queue counts
//! and in-flight holds; the [`QueueRegistry`] rotates queues for fair
//! dispatch. [`Frontier::open`] rebuilds the in-memory state from the store
//! at startup and refuses to serve an inconsistent one.
//!
//! Streaming operations are channel-shaped: a put stream is a
//! `Sender<UrlItem>` paired with a `Receiver<String>` of acks, a get stream
//! is a `Receiver<UrlInfo>`. An RPC transport attaches at that seam; none is
//! provided here.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

mod admin;
mod get;
mod put;
mod queue;
mod recovery;
mod registry;
pub mod schema;
mod service;
pub mod store;

pub use admin::Stats;
pub use get::{GetParams, DEFAULT_DELAY_REQUESTABLE_SECS};
pub use put::{PutConfig, PutStream, UrlItem};
pub use queue::QueueMetadata;
pub use registry::QueueRegistry;
pub use service::Frontier;
pub use store::{StoreConfig, Storage};


/// Crawl identifier used when none is supplied.
pub const DEFAULT_CRAWL_ID: &str = "DEFAULT";

/// Maximum length in bytes of a queue key; longer keys are rejected on ingest.
pub const MAX_QUEUE_KEY_LENGTH: usize = 255;

/// Normalise a crawl identifier: an empty string maps to [`DEFAULT_CRAWL_ID`].
pub fn normalise_crawl_id(crawl_id: &str) -> String {
    if crawl_id.is_empty() {
        DEFAULT_CRAWL_ID.to_string()
    } else {
        crawl_id.to_string()
    }
}

/// Current time as epoch seconds. All scheduling decisions run on this clock.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A queue scoped to a crawl. Ordered lexicographically by crawl id then
/// queue key, which is the order the admin range deletes rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueWithinCrawl {
    pub crawl_id: String,
    pub queue: String,
}

impl QueueWithinCrawl {
    /// Build a queue identifier, normalising the crawl id.
    pub fn new(crawl_id: &str, queue: &str) -> Self {
        Self {
            crawl_id: normalise_crawl_id(crawl_id),
            queue: queue.to_string(),
        }
    }
}

impl std::fmt::Display for QueueWithinCrawl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.crawl_id, self.queue)
    }
}

/// Everything the frontier knows about a URL. Stored as the value of its
/// scheduling entry; `metadata` is opaque to the frontier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlInfo {
    pub url: String,
    /// Queue key. Empty on ingest means "derive from the URL host".
    pub key: String,
    /// Crawl identifier. Empty on ingest means [`DEFAULT_CRAWL_ID`].
    pub crawl_id: String,
    pub metadata: HashMap<String, Vec<String>>,
}

impl UrlInfo {
    /// A bare URL with no queue key, crawl id or metadata.
    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_crawl_id_normalised_to_default() {
        assert_eq!(normalise_crawl_id(""), "DEFAULT");
        assert_eq!(normalise_crawl_id("my-crawl"), "my-crawl");
    }

    #[test]
    fn queue_within_crawl_orders_by_crawl_then_queue() {
        let a = QueueWithinCrawl::new("c1", "z");
        let b = QueueWithinCrawl::new("c2", "a");
        let c = QueueWithinCrawl::new("c1", "a");
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn queue_within_crawl_normalises_crawl_id() {
        let q = QueueWithinCrawl::new("", "example.org");
        assert_eq!(q.crawl_id, "DEFAULT");
    }
}
