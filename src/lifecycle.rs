//! Process startup and restart semantics.
//!
//! On every boot the service either preserves dataset registrations and
//! discards only the transient monitoring state accumulated since the
//! last run (the default, "smart restart"), or wipes every registration
//! and its downstream history as well ("full reset"), per
//! [`crate::config::AppConfig::preserve_connections_on_restart`].

use std::sync::Arc;

use crate::store::{DatasetStore, DiffStore, FindingStore, SnapshotStore};
use crate::types::DatasetId;

/// Error during a restart sweep: each backend's error type is kept
/// distinct rather than unified, since a failure in one store should be
/// attributable to that store.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError<DAE, SE, DE, FE>
where
    DAE: std::error::Error + Send + Sync + 'static,
    SE: std::error::Error + Send + Sync + 'static,
    DE: std::error::Error + Send + Sync + 'static,
    FE: std::error::Error + Send + Sync + 'static,
{
    #[error("dataset store error: {0}")]
    Dataset(DAE),
    #[error("snapshot store error: {0}")]
    Snapshot(SE),
    #[error("diff store error: {0}")]
    Diff(DE),
    #[error("finding store error: {0}")]
    Finding(FE),
}

/// Tally of a restart sweep, logged by the caller at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartReport {
    pub datasets_touched: usize,
    pub datasets_deactivated: usize,
}

/// Coordinates the dataset, snapshot, diff, and finding stores across a
/// process restart.
pub struct LifecycleManager<DA, SS, DS, FS> {
    datasets: Arc<DA>,
    snapshots: Arc<SS>,
    diffs: Arc<DS>,
    findings: Arc<FS>,
}

impl<DA, SS, DS, FS> LifecycleManager<DA, SS, DS, FS>
where
    DA: DatasetStore,
    SS: SnapshotStore,
    DS: DiffStore,
    FS: FindingStore,
{
    pub fn new(datasets: Arc<DA>, snapshots: Arc<SS>, diffs: Arc<DS>, findings: Arc<FS>) -> Self {
        Self { datasets, snapshots, diffs, findings }
    }

    /// Clear every dataset's transient monitoring state (last check time,
    /// connection health, accumulated snapshots/diffs/findings) while
    /// keeping the registrations themselves, so change detection treats
    /// every dataset as a fresh baseline on the next tick.
    pub async fn smart_restart(&self) -> Result<RestartReport, LifecycleError<DA::Error, SS::Error, DS::Error, FS::Error>> {
        let all = self.datasets.list_all().await.map_err(LifecycleError::Dataset)?;
        let mut report = RestartReport::default();
        for mut dataset in all {
            self.clear_dataset_state(dataset.id).await?;
            dataset.clear_monitoring_fields();
            self.datasets.update(dataset).await.map_err(LifecycleError::Dataset)?;
            report.datasets_touched += 1;
        }
        Ok(report)
    }

    /// Deactivate every dataset and clear all downstream state. Registered
    /// connections remain on file (for audit) but no longer participate in
    /// scheduling; re-registration is required to resume monitoring.
    pub async fn full_reset(&self) -> Result<RestartReport, LifecycleError<DA::Error, SS::Error, DS::Error, FS::Error>> {
        let all = self.datasets.list_all().await.map_err(LifecycleError::Dataset)?;
        let mut report = RestartReport::default();
        for dataset in all {
            self.clear_dataset_state(dataset.id).await?;
            self.datasets.deactivate(&dataset.id).await.map_err(LifecycleError::Dataset)?;
            report.datasets_touched += 1;
            report.datasets_deactivated += 1;
        }
        Ok(report)
    }

    /// Reset one dataset's monitoring data, equivalent to
    /// [`LifecycleManager::smart_restart`] scoped to a single dataset.
    /// Used by the control API's `/api/datasets/:id/reset` handler.
    pub async fn reset_dataset(&self, dataset_id: DatasetId) -> Result<(), LifecycleError<DA::Error, SS::Error, DS::Error, FS::Error>> {
        let mut dataset = self.datasets.get(&dataset_id).await.map_err(LifecycleError::Dataset)?;
        self.clear_dataset_state(dataset_id).await?;
        if let Some(dataset) = dataset.as_mut() {
            dataset.clear_monitoring_fields();
            self.datasets.update(dataset.clone()).await.map_err(LifecycleError::Dataset)?;
        }
        Ok(())
    }

    async fn clear_dataset_state(&self, dataset_id: DatasetId) -> Result<(), LifecycleError<DA::Error, SS::Error, DS::Error, FS::Error>> {
        self.snapshots.delete_all(&dataset_id).await.map_err(LifecycleError::Snapshot)?;
        self.diffs.delete_by_dataset(&dataset_id).await.map_err(LifecycleError::Diff)?;
        self.findings.delete_by_dataset(&dataset_id).await.map_err(LifecycleError::Finding)?;
        Ok(())
    }
}
