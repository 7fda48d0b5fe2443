//! Ordered key/value store adapter over RocksDB.
//!
//! The frontier needs exactly four primitives from its store: point
//! get/put/delete per column family, forward iteration from a byte prefix,
//! and range deletion. [`Storage`] provides them over the two frontier
//! column families; [`ColumnFamily`] markers carry the family name and its
//! RocksDB tuning so call sites select a family by type.

mod config;
mod storage;

pub use config::StoreConfig;
pub use storage::Storage;

/// Marker trait for a column family: its name and RocksDB options.
///
/// Implemented by the schema's family markers. `cf_options` receives the
/// store configuration so per-family tuning (bloom filters, level sizing)
/// follows the operator's settings.
pub trait ColumnFamily {
    /// Column family name as it appears on disk.
    const CF_NAME: &'static str;

    /// Build the RocksDB options for this family.
    fn cf_options(config: &StoreConfig) -> rocksdb::Options;
}
