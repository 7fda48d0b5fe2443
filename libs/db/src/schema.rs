//! Column families and key codec for the two-keyspace frontier layout.
//!
//! ## Keyspaces
//!
//! - **Existence** (`default` CF): one entry per URL ever accepted.
//!   Key: `esc(crawl) "_" esc(queue) "_" url`. Value: empty bytes when the
//!   URL is completed, otherwise the exact scheduling key currently
//!   representing the URL.
//! - **Scheduling** (`queues` CF): one entry per URL awaiting fetch.
//!   Key: `esc(crawl) "_" esc(queue) "_" pad10(next_fetch) "_" url`.
//!   Value: the MessagePack-serialized [`UrlInfo`].
//!
//! `esc` replaces `_` with `%5F` so that the underscore separator parses
//! unambiguously; `pad10` is the next-fetch epoch seconds zero-padded to ten
//! digits so lexicographic key order equals numeric time order within a
//! queue. Both rules are compatibility surface: the byte layout must match
//! preexisting stores exactly.

use anyhow::{bail, Result};

use crate::store::{ColumnFamily, StoreConfig};
use crate::{QueueWithinCrawl, UrlInfo};

const SEPARATOR: u8 = b'_';
const ESCAPED_SEPARATOR: &str = "%5F";

// ============================================================================
// Column family markers
// ============================================================================

/// Existence family: URL lifecycle. Lives in the default column family so
/// that stores written by earlier implementations open unchanged.
pub struct Existence;

impl ColumnFamily for Existence {
    const CF_NAME: &'static str = "default";

    fn cf_options(config: &StoreConfig) -> rocksdb::Options {
        let mut opts = base_cf_options(config);
        // Point lookups on every put; bloom filters pay for themselves here.
        if config.bloom_filters {
            let mut block_opts = rocksdb::BlockBasedOptions::default();
            block_opts.set_bloom_filter(10.0, false);
            opts.set_block_based_table_factory(&block_opts);
        }
        opts
    }
}

/// Scheduling family: time-ordered fetch queue per queue prefix.
pub struct Scheduling;

impl ColumnFamily for Scheduling {
    const CF_NAME: &'static str = "queues";

    fn cf_options(config: &StoreConfig) -> rocksdb::Options {
        base_cf_options(config)
    }
}

fn base_cf_options(config: &StoreConfig) -> rocksdb::Options {
    let mut opts = rocksdb::Options::default();
    opts.optimize_universal_style_compaction(512 * 1024 * 1024);
    if let Some(bytes) = config.max_bytes_for_level_base {
        opts.set_max_bytes_for_level_base(bytes);
    }
    opts
}

// ============================================================================
// Key codec
// ============================================================================

/// Escape the separator inside an identifier: `_` becomes `%5F`.
pub fn escape(part: &str) -> String {
    part.replace('_', ESCAPED_SEPARATOR)
}

/// Reverse [`escape`].
pub fn unescape(part: &str) -> String {
    part.replace(ESCAPED_SEPARATOR, "_")
}

fn pad10(epoch_secs: u64) -> String {
    format!("{:010}", epoch_secs)
}

/// `esc(crawl) "_" esc(queue) "_"` — the byte prefix shared by every key of
/// a queue in both families.
pub fn queue_prefix(queue: &QueueWithinCrawl) -> Vec<u8> {
    let mut key = String::with_capacity(queue.crawl_id.len() + queue.queue.len() + 2);
    key.push_str(&escape(&queue.crawl_id));
    key.push(SEPARATOR as char);
    key.push_str(&escape(&queue.queue));
    key.push(SEPARATOR as char);
    key.into_bytes()
}

/// `esc(crawl) "_"` — the byte prefix shared by every key of a crawl.
pub fn crawl_prefix(crawl_id: &str) -> Vec<u8> {
    let mut key = escape(crawl_id);
    key.push(SEPARATOR as char);
    key.into_bytes()
}

/// Existence key for a URL within a queue.
pub fn existence_key(queue: &QueueWithinCrawl, url: &str) -> Vec<u8> {
    let mut key = queue_prefix(queue);
    key.extend_from_slice(url.as_bytes());
    key
}

/// Scheduling key placing a URL at its fetch time within a queue.
pub fn scheduling_key(queue: &QueueWithinCrawl, next_fetch: u64, url: &str) -> Vec<u8> {
    let mut key = queue_prefix(queue);
    key.extend_from_slice(pad10(next_fetch).as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(url.as_bytes());
    key
}

/// Parse the queue out of a key from either family. Splits on the first two
/// separators; the remainder (the URL, or date and URL) is left untouched
/// since URLs may themselves contain underscores.
pub fn parse_queue(key: &[u8]) -> Result<QueueWithinCrawl> {
    let text = std::str::from_utf8(key)?;
    let Some(pos) = text.find('_') else {
        bail!("key has no crawl separator: {text}");
    };
    let Some(pos2) = text[pos + 1..].find('_').map(|p| p + pos + 1) else {
        bail!("key has no queue separator: {text}");
    };
    Ok(QueueWithinCrawl {
        crawl_id: unescape(&text[..pos]),
        queue: unescape(&text[pos + 1..pos2]),
    })
}

/// A fully decomposed scheduling key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingKey {
    pub queue: QueueWithinCrawl,
    pub next_fetch: u64,
    pub url: String,
}

/// Parse a scheduling key into queue, next-fetch date and URL.
pub fn parse_scheduling_key(key: &[u8]) -> Result<SchedulingKey> {
    let text = std::str::from_utf8(key)?;
    let Some(pos) = text.find('_') else {
        bail!("scheduling key has no crawl separator: {text}");
    };
    let Some(pos2) = text[pos + 1..].find('_').map(|p| p + pos + 1) else {
        bail!("scheduling key has no queue separator: {text}");
    };
    let Some(pos3) = text[pos2 + 1..].find('_').map(|p| p + pos2 + 1) else {
        bail!("scheduling key has no date separator: {text}");
    };
    let next_fetch: u64 = text[pos2 + 1..pos3].parse()?;
    Ok(SchedulingKey {
        queue: QueueWithinCrawl {
            crawl_id: unescape(&text[..pos]),
            queue: unescape(&text[pos + 1..pos2]),
        },
        next_fetch,
        url: text[pos3 + 1..].to_string(),
    })
}

// ============================================================================
// Value serde
// ============================================================================

/// Serialize a [`UrlInfo`] for storage in the scheduling family.
pub fn url_info_to_bytes(info: &UrlInfo) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(info)?)
}

/// Deserialize a stored scheduling value.
pub fn url_info_from_bytes(bytes: &[u8]) -> Result<UrlInfo> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(crawl: &str, queue: &str) -> QueueWithinCrawl {
        QueueWithinCrawl::new(crawl, queue)
    }

    #[test]
    fn escape_round_trip() {
        assert_eq!(escape("a_b_c"), "a%5Fb%5Fc");
        assert_eq!(unescape(&escape("a_b_c")), "a_b_c");
        assert_eq!(escape("no-separator"), "no-separator");
    }

    #[test]
    fn queue_prefix_escapes_identifiers() {
        // The documented compatibility example: ids containing underscores.
        let prefix = queue_prefix(&q("c_2", "q_1"));
        assert_eq!(prefix, b"c%5F2_q%5F1_".to_vec());
    }

    #[test]
    fn existence_key_appends_raw_url() {
        let key = existence_key(&q("DEFAULT", "example.org"), "http://example.org/a_b");
        assert_eq!(key, b"DEFAULT_example.org_http://example.org/a_b".to_vec());
    }

    #[test]
    fn scheduling_key_zero_pads_date() {
        let key = scheduling_key(&q("DEFAULT", "example.org"), 1234, "http://example.org/");
        assert_eq!(
            key,
            b"DEFAULT_example.org_0000001234_http://example.org/".to_vec()
        );
    }

    #[test]
    fn scheduling_key_order_follows_date() {
        let queue = q("DEFAULT", "example.org");
        let earlier = scheduling_key(&queue, 999, "http://example.org/z");
        let later = scheduling_key(&queue, 1000, "http://example.org/a");
        assert!(earlier < later);
    }

    #[test]
    fn parse_queue_round_trips_underscores() {
        let queue = q("c_2", "q_1");
        let key = existence_key(&queue, "http://a/x");
        assert_eq!(parse_queue(&key).unwrap(), queue);
    }

    #[test]
    fn parse_scheduling_key_round_trips() {
        let queue = q("crawl_A", "host_1.example");
        let url = "http://host_1.example/path_with_underscores";
        let key = scheduling_key(&queue, 1700000000, url);
        let parsed = parse_scheduling_key(&key).unwrap();
        assert_eq!(parsed.queue, queue);
        assert_eq!(parsed.next_fetch, 1700000000);
        assert_eq!(parsed.url, url);
    }

    #[test]
    fn parse_rejects_separator_free_keys() {
        assert!(parse_queue(b"nounderscore").is_err());
        assert!(parse_scheduling_key(b"a_b").is_err());
    }

    #[test]
    fn url_info_value_round_trip() {
        let mut info = UrlInfo::with_url("http://example.org/");
        info.key = "example.org".to_string();
        info.crawl_id = "DEFAULT".to_string();
        info.metadata
            .insert("depth".to_string(), vec!["2".to_string()]);
        let bytes = url_info_to_bytes(&info).unwrap();
        assert_eq!(url_info_from_bytes(&bytes).unwrap(), info);
    }
}
