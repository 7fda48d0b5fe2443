//! RocksDB storage for the frontier's two column families.

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Result};
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};

use super::{ColumnFamily, StoreConfig};
use crate::schema::{Existence, Scheduling};

/// Owns the RocksDB handle and the two frontier families.
///
/// Point writes are durable on return (RocksDB WAL); range deletes are
/// atomic per call. The handle is internally synchronized, so `Storage`
/// is shared freely behind an `Arc`. Dropping the last reference closes
/// the column families and the database.
pub struct Storage {
    db: DB,
    db_options: Options,
    config: StoreConfig,
}

impl Storage {
    /// Open (creating if missing) the store described by `config`.
    ///
    /// Honors `purge` by clearing the path first, then opens both column
    /// families with the configured tuning.
    #[tracing::instrument(skip(config), fields(path = %config.path.display()))]
    pub fn open(config: StoreConfig) -> Result<Self> {
        let path = &config.path;

        match path.try_exists() {
            Err(e) => return Err(e.into()),
            Ok(true) => {
                if path.is_file() {
                    return Err(anyhow!("Store path is a file: {}", path.display()));
                }
                if config.purge {
                    tracing::info!("Purging store path before opening");
                    std::fs::remove_dir_all(path)?;
                }
            }
            Ok(false) => {}
        }

        let mut db_options = Options::default();
        db_options.create_if_missing(true);
        db_options.create_missing_column_families(true);
        if let Some(jobs) = config.max_background_jobs {
            db_options.set_max_background_jobs(jobs);
        }
        if let Some(subcompactions) = config.max_subcompactions {
            db_options.set_max_subcompactions(subcompactions);
        }
        if config.stats {
            tracing::info!("Enabling store statistics capture");
            db_options.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(Existence::CF_NAME, Existence::cf_options(&config)),
            ColumnFamilyDescriptor::new(Scheduling::CF_NAME, Scheduling::cf_options(&config)),
        ];

        let start = Instant::now();
        let db = DB::open_cf_descriptors(&db_options, path, cf_descriptors)?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Store opened");

        Ok(Self {
            db,
            db_options,
            config,
        })
    }

    fn cf<C: ColumnFamily>(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(C::CF_NAME)
            .ok_or_else(|| anyhow!("Column family not found: {}", C::CF_NAME))
    }

    /// Point lookup in family `C`.
    pub fn get<C: ColumnFamily>(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf::<C>()?, key)?)
    }

    /// Durable point write in family `C`.
    pub fn put<C: ColumnFamily>(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.db.put_cf(self.cf::<C>()?, key, value)?)
    }

    /// Durable point delete in family `C`.
    pub fn delete<C: ColumnFamily>(&self, key: &[u8]) -> Result<()> {
        Ok(self.db.delete_cf(self.cf::<C>()?, key)?)
    }

    /// Forward iteration over family `C` starting at `from` (a byte prefix
    /// or full key). The caller stops the scan; entries past the prefix are
    /// the caller's to detect.
    pub fn iter_from<'a, C: ColumnFamily>(
        &'a self,
        from: &[u8],
    ) -> Result<impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>)>> + 'a> {
        let cf = self.cf::<C>()?;
        Ok(self
            .db
            .iterator_cf(cf, IteratorMode::From(from, Direction::Forward))
            .map(|item| item.map_err(Into::into)))
    }

    /// Delete `[start, end)` from family `C`. Atomic per call.
    pub fn delete_range<C: ColumnFamily>(&self, start: &[u8], end: &[u8]) -> Result<()> {
        Ok(self.db.delete_range_cf(self.cf::<C>()?, start, end)?)
    }

    /// Last key currently present in family `C`, if any. Used to bound a
    /// range delete when no later queue exists.
    pub fn last_key<C: ColumnFamily>(&self) -> Result<Option<Vec<u8>>> {
        let cf = self.cf::<C>()?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(Some(key.into_vec()))
            }
            None => Ok(None),
        }
    }

    /// Flush both families to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush_cf(self.cf::<Existence>()?)?;
        self.db.flush_cf(self.cf::<Scheduling>()?)?;
        Ok(())
    }

    /// Accumulated store-internal statistics, when capture is enabled.
    pub fn statistics(&self) -> Option<String> {
        if self.config.stats {
            self.db_options.get_statistics()
        } else {
            None
        }
    }

    /// The store's filesystem path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Storage {
        Storage::open(StoreConfig::with_path(dir.path().join("db"))).unwrap()
    }

    #[test]
    fn put_get_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = open(&dir);

        storage.put::<Existence>(b"k1", b"v1").unwrap();
        assert_eq!(storage.get::<Existence>(b"k1").unwrap(), Some(b"v1".to_vec()));
        // Families are distinct keyspaces.
        assert_eq!(storage.get::<Scheduling>(b"k1").unwrap(), None);

        storage.delete::<Existence>(b"k1").unwrap();
        assert_eq!(storage.get::<Existence>(b"k1").unwrap(), None);
    }

    #[test]
    fn iteration_is_ordered_and_seekable() {
        let dir = TempDir::new().unwrap();
        let storage = open(&dir);

        for key in [b"a_1".as_slice(), b"a_2", b"b_1", b"b_2"] {
            storage.put::<Scheduling>(key, b"").unwrap();
        }

        let keys: Vec<Vec<u8>> = storage
            .iter_from::<Scheduling>(b"b_")
            .unwrap()
            .map(|entry| entry.unwrap().0.into_vec())
            .collect();
        assert_eq!(keys, vec![b"b_1".to_vec(), b"b_2".to_vec()]);
    }

    #[test]
    fn delete_range_removes_half_open_interval() {
        let dir = TempDir::new().unwrap();
        let storage = open(&dir);

        for key in [b"a".as_slice(), b"b", b"c", b"d"] {
            storage.put::<Existence>(key, b"x").unwrap();
        }
        storage.delete_range::<Existence>(b"b", b"d").unwrap();

        assert!(storage.get::<Existence>(b"a").unwrap().is_some());
        assert!(storage.get::<Existence>(b"b").unwrap().is_none());
        assert!(storage.get::<Existence>(b"c").unwrap().is_none());
        assert!(storage.get::<Existence>(b"d").unwrap().is_some());
    }

    #[test]
    fn last_key_reports_tail() {
        let dir = TempDir::new().unwrap();
        let storage = open(&dir);

        assert_eq!(storage.last_key::<Existence>().unwrap(), None);
        storage.put::<Existence>(b"a", b"").unwrap();
        storage.put::<Existence>(b"z", b"").unwrap();
        assert_eq!(storage.last_key::<Existence>().unwrap(), Some(b"z".to_vec()));
    }

    #[test]
    fn reopen_persists_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let storage = Storage::open(StoreConfig::with_path(&path)).unwrap();
            storage.put::<Existence>(b"k", b"v").unwrap();
            storage.flush().unwrap();
        }
        let storage = Storage::open(StoreConfig::with_path(&path)).unwrap();
        assert_eq!(storage.get::<Existence>(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn purge_clears_existing_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let storage = Storage::open(StoreConfig::with_path(&path)).unwrap();
            storage.put::<Existence>(b"k", b"v").unwrap();
            storage.flush().unwrap();
        }
        let mut config = StoreConfig::with_path(&path);
        config.purge = true;
        let storage = Storage::open(config).unwrap();
        assert_eq!(storage.get::<Existence>(b"k").unwrap(), None);
    }
}
