//! Service state management.
//!
//! One generic state struct wrapping a single store backend (which must
//! implement every entity trait, mirroring how `PostgresStore` does) plus
//! the `Scheduler` and `LifecycleManager` built on top of it.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::lifecycle::LifecycleManager;
use crate::scheduler::Scheduler;
use crate::source::SourceReader;
use crate::store::{DatasetStore, DiffStore, FindingStore, SnapshotStore};

/// Shared service state, generic over the store backend and source reader
/// so it can be exercised against in-memory stores in integration tests.
pub struct ServiceState<S, R> {
    pub store: Arc<S>,
    pub scheduler: Arc<Scheduler<R, S, S, S, S>>,
    pub lifecycle: Arc<LifecycleManager<S, S, S, S>>,
    pub config: AppConfig,
}

impl<S, R> ServiceState<S, R>
where
    S: DatasetStore + SnapshotStore + DiffStore + FindingStore + 'static,
    R: SourceReader + 'static,
{
    pub fn new(store: S, source: R, config: AppConfig) -> Self {
        let store = Arc::new(store);
        let source = Arc::new(source);
        let scheduler = Arc::new(Scheduler::new(
            source,
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            config.clone(),
        ));
        let lifecycle = Arc::new(LifecycleManager::new(store.clone(), store.clone(), store.clone(), store.clone()));
        Self { store, scheduler, lifecycle, config }
    }
}

impl<S, R> Clone for ServiceState<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scheduler: self.scheduler.clone(),
            lifecycle: self.lifecycle.clone(),
            config: self.config.clone(),
        }
    }
}
