//! Store configuration parsed from `key=value` options.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Recognized `store.*` options.
///
/// Boolean options follow presence semantics: supplying the key with any
/// value other than `"false"` enables the option. Numeric options are passed
/// through to RocksDB untouched.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Filesystem path for the store (`store.path`).
    pub path: PathBuf,
    /// Delete the path contents before opening (`store.purge`).
    pub purge: bool,
    /// Enable bloom filters on the existence family (`store.bloom_filters`).
    pub bloom_filters: bool,
    /// `store.max_background_jobs`.
    pub max_background_jobs: Option<i32>,
    /// `store.max_subcompactions`.
    pub max_subcompactions: Option<u32>,
    /// `store.max_bytes_for_level_base`.
    pub max_bytes_for_level_base: Option<u64>,
    /// Capture store-internal statistics for stats reporting (`store.stats`).
    pub stats: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./frontier"),
            purge: false,
            bloom_filters: false,
            max_background_jobs: None,
            max_subcompactions: None,
            max_bytes_for_level_base: None,
            stats: false,
        }
    }
}

impl StoreConfig {
    /// Config with the given path and defaults for everything else.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration map of `store.*` options. Unknown keys are
    /// logged and ignored so configurations shared with other components
    /// pass through cleanly.
    pub fn from_map(options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in options {
            match key.as_str() {
                "store.path" => config.path = PathBuf::from(value),
                "store.purge" => config.purge = flag(value),
                "store.bloom_filters" => config.bloom_filters = flag(value),
                "store.stats" => config.stats = flag(value),
                "store.max_background_jobs" => {
                    config.max_background_jobs = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid {key}: {value}"))?,
                    );
                }
                "store.max_subcompactions" => {
                    config.max_subcompactions = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid {key}: {value}"))?,
                    );
                }
                "store.max_bytes_for_level_base" => {
                    config.max_bytes_for_level_base = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid {key}: {value}"))?,
                    );
                }
                _ => {
                    tracing::warn!(%key, "Ignoring unrecognized store option");
                }
            }
        }
        Ok(config)
    }
}

fn flag(value: &str) -> bool {
    value != "false"
}
