//! The frontier service: shared state and lifecycle.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use dashmap::DashSet;

use crate::recovery;
use crate::registry::QueueRegistry;
use crate::store::{Storage, StoreConfig};
use crate::QueueWithinCrawl;

/// Handle on a running frontier. Cheap to clone; every clone shares the
/// store, the queue registry and the set of queues being torn down.
///
/// All operations may be invoked from any task. The pipelines never hold an
/// in-memory lock across a store call; see the module docs of [`crate::put`]
/// and [`crate::get`] for the per-operation guarantees.
#[derive(Clone)]
pub struct Frontier {
    storage: Arc<Storage>,
    queues: Arc<QueueRegistry>,
    deleting: Arc<DashSet<QueueWithinCrawl>>,
}

impl Frontier {
    /// Open the store and rebuild the in-memory queue state from it.
    ///
    /// Returns an error — and must not be retried against the same state —
    /// when the store's two families disagree; a frontier that cannot trust
    /// its counts must not serve.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let storage = Arc::new(Storage::open(config)?);

        tracing::info!("Scanning store to rebuild queues (can take a while)");
        let start = Instant::now();
        let queues = Arc::new(QueueRegistry::new());
        recovery::recover(&storage, &queues)?;
        tracing::info!(
            queues = queues.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Queues recovered"
        );

        Ok(Self {
            storage,
            queues,
            deleting: Arc::new(DashSet::new()),
        })
    }

    /// Flush the store. The database handle itself closes when the last
    /// clone of this frontier is dropped.
    pub fn close(&self) -> Result<()> {
        self.storage.flush()
    }

    /// Number of queues currently registered.
    pub fn number_of_queues(&self) -> usize {
        self.queues.len()
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn registry(&self) -> &QueueRegistry {
        &self.queues
    }

    pub(crate) fn deleting(&self) -> &DashSet<QueueWithinCrawl> {
        &self.deleting
    }
}
