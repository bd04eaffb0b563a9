//! Dual-cadence background loop: one tick walks active datasets due for a
//! change-detection pass, the other dispatches an on-demand quality check
//! and records its status for the control API to poll.

pub mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;

use crate::config::AppConfig;
use crate::detector::ChangeDetector;
use crate::quality::{ProgressReporter, QualityRunner};
use crate::source::SourceReader;
use crate::store::{DatasetStore, DiffStore, FindingStore, SnapshotStore};
use crate::types::{ConnectionStatus, Dataset, DatasetId, RunState};

pub use status::QualityCheckStatusMap;

/// Error dispatching a quality check: surfaced to the caller (typically an
/// API handler) rather than only logged, since it is triggered on demand.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dataset {0} is not registered")]
    DatasetNotFound(DatasetId),
    #[error("dataset {0} has no baseline yet; run change detection first")]
    NoBaseline(DatasetId),
    #[error("a quality check is already running for dataset {0}")]
    AlreadyRunning(DatasetId),
}

/// Owns the background loop's collaborators. Generic over concrete store
/// and source-reader types, holding `Arc<S>` rather than a trait object
/// since the call sites are known at compile time.
pub struct Scheduler<R, DA, SS, DS, FS> {
    source: Arc<R>,
    datasets: Arc<DA>,
    snapshots: Arc<SS>,
    diffs: Arc<DS>,
    findings: Arc<FS>,
    status: Arc<QualityCheckStatusMap>,
    config: AppConfig,
    /// Process-level shutdown signal, observed between datasets by the
    /// change-detection tick and between features by a running quality
    /// check. Set via [`Scheduler::request_shutdown`].
    shutdown: Arc<AtomicBool>,
}

/// Reports a running quality check's progress into its [`QualityCheckStatusMap`]
/// entry and doubles as the per-feature shutdown check.
struct StatusProgressReporter {
    status: Arc<QualityCheckStatusMap>,
    dataset_id: DatasetId,
    shutdown: Arc<AtomicBool>,
}

impl ProgressReporter for StatusProgressReporter {
    fn report(&self, phase: &str, current: usize, total: usize) -> bool {
        self.status.update_progress(self.dataset_id, current, total, phase);
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl<R, DA, SS, DS, FS> Scheduler<R, DA, SS, DS, FS>
where
    R: SourceReader + 'static,
    DA: DatasetStore + 'static,
    SS: SnapshotStore + 'static,
    DS: DiffStore + 'static,
    FS: FindingStore + 'static,
{
    pub fn new(source: Arc<R>, datasets: Arc<DA>, snapshots: Arc<SS>, diffs: Arc<DS>, findings: Arc<FS>, config: AppConfig) -> Self {
        Self {
            source,
            datasets,
            snapshots,
            diffs,
            findings,
            status: Arc::new(QualityCheckStatusMap::new()),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn status(&self) -> Arc<QualityCheckStatusMap> {
        self.status.clone()
    }

    /// Request a graceful stop: observed between datasets by the next
    /// change-detection tick and between features by any quality check
    /// currently running.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Run one change-detection pass over every active dataset that is due,
    /// per [`Dataset::is_due`]. A single dataset's failure (typically a
    /// connection error) is recorded on that dataset and never aborts the
    /// rest of the sweep. Stops before starting the next dataset once a
    /// shutdown has been requested.
    pub async fn run_change_detection_tick(&self) -> Result<(), DA::Error> {
        let now = Utc::now();
        let active = self.datasets.list_active().await?;
        for dataset in active {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if !dataset.is_due(now) {
                continue;
            }
            self.check_one_dataset(dataset).await?;
        }
        Ok(())
    }

    async fn check_one_dataset(&self, mut dataset: Dataset) -> Result<(), DA::Error> {
        let detector = ChangeDetector::new(self.snapshots.clone(), self.diffs.clone(), self.config.quality.clone());
        match self.source.read_all(&dataset.connection).await {
            Ok(rows) => {
                dataset.connection_status = ConnectionStatus::Ok;
                dataset.connection_error = None;
                dataset.last_connection_test = Some(Utc::now());
                dataset.last_check_at = Some(Utc::now());
                #[cfg(feature = "service")]
                crate::service::record_connection_test(&dataset.id.to_string(), true);
                match detector.detect(dataset.id, &rows).await {
                    Ok(report) => {
                        tracing::info!(dataset = %dataset.name, new = report.new, updated = report.updated, deleted = report.deleted, "change detection complete");
                    }
                    Err(err) => {
                        tracing::error!(dataset = %dataset.name, error = %err, "change detection failed after reading the source");
                    }
                }
            }
            Err(err) => {
                dataset.connection_status = ConnectionStatus::Failed;
                dataset.connection_error = Some(err.to_string());
                dataset.last_connection_test = Some(Utc::now());
                #[cfg(feature = "service")]
                crate::service::record_connection_test(&dataset.id.to_string(), false);
                tracing::warn!(dataset = %dataset.name, error = %err, "could not read remote source");
            }
        }
        self.datasets.update(dataset).await?;
        Ok(())
    }

    /// Dispatch a quality check for one dataset. Validates eligibility
    /// synchronously (unregistered dataset, no baseline yet, already
    /// running) and returns as soon as the run is recorded as `running`;
    /// the engine itself executes in a spawned background task. Progress
    /// and the final summary are available through [`Scheduler::status`]
    /// for the duration the entry survives.
    pub async fn dispatch_quality_check(&self, dataset_id: DatasetId) -> Result<(), DispatchError> {
        let dataset = self.datasets.get(&dataset_id).await.ok().flatten().ok_or(DispatchError::DatasetNotFound(dataset_id))?;
        if dataset.has_no_baseline() {
            return Err(DispatchError::NoBaseline(dataset_id));
        }
        if self.status.get(&dataset_id).map(|s| s.state == RunState::Running).unwrap_or(false) {
            return Err(DispatchError::AlreadyRunning(dataset_id));
        }

        self.status.start(dataset_id, dataset.name.clone());

        let source = self.source.clone();
        let snapshots = self.snapshots.clone();
        let findings = self.findings.clone();
        let status = self.status.clone();
        let thresholds = self.config.quality.clone();
        let connection = dataset.connection.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let rows = match source.read_all(&connection).await {
                Ok(rows) => rows,
                Err(err) => {
                    status.fail(dataset_id, err.to_string());
                    return;
                }
            };
            let reporter = StatusProgressReporter { status: status.clone(), dataset_id, shutdown };
            let runner = QualityRunner::new(snapshots, findings, thresholds);
            match runner.run_for_dataset(dataset_id, &rows, Some(&reporter)).await {
                Ok(summary) => status.complete(dataset_id, summary),
                Err(err) => status.fail(dataset_id, err.to_string()),
            }
        });

        Ok(())
    }

    /// Sweep expired status entries. Intended to be called on the same tick
    /// as change detection, not as its own loop.
    pub fn sweep_status(&self) {
        self.status.sweep(Utc::now(), chrono::Duration::from_std(self.config.quality_status_ttl).unwrap_or(chrono::Duration::seconds(300)));
    }

    /// The configured change-detection tick interval, for the caller's
    /// `tokio::time::interval`.
    pub fn tick_interval(&self) -> StdDuration {
        self.config.change_loop_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FeatureRow, SourceError};
    use crate::store::{InMemoryDatasetStore, InMemoryDiffStore, InMemoryFindingStore, InMemorySnapshotStore};
    use crate::types::{AttributeValue, ConnectionDescriptor, EncryptPreference};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubSource {
        fail: AtomicBool,
    }

    #[async_trait]
    impl SourceReader for StubSource {
        async fn read_all(&self, _connection: &ConnectionDescriptor) -> Result<Vec<FeatureRow>, SourceError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SourceError::InvalidIdentifier("stub failure".to_string()));
            }
            let mut attributes = BTreeMap::new();
            attributes.insert("name".to_string(), AttributeValue::Text("parcel-1".to_string()));
            Ok(vec![FeatureRow {
                source_row_id: None,
                attributes,
                geometry_wkb: vec![1, 2, 3],
                is_valid: true,
                validity_reason: None,
                is_simple: true,
                geom_area: 10.0,
                geom_length: 0.0,
                num_points: 5,
                geom_type: "POLYGON".to_string(),
                is_ccw_oriented: Some(true),
                is_topologically_clean: true,
                min_x: 0.0,
                max_x: 1.0,
                min_y: 0.0,
                max_y: 1.0,
            }])
        }
    }

    fn connection() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "localhost".to_string(),
            port: 5432,
            database: "gis".to_string(),
            schema: "public".to_string(),
            table: "parcels".to_string(),
            geometry_column: "geom".to_string(),
            encrypt: EncryptPreference::Prefer,
        }
    }

    fn scheduler(fail: bool) -> (Scheduler<StubSource, InMemoryDatasetStore, InMemorySnapshotStore, InMemoryDiffStore, InMemoryFindingStore>, Arc<InMemoryDatasetStore>) {
        let datasets = Arc::new(InMemoryDatasetStore::default());
        let scheduler = Scheduler::new(
            Arc::new(StubSource { fail: AtomicBool::new(fail) }),
            datasets.clone(),
            Arc::new(InMemorySnapshotStore::default()),
            Arc::new(InMemoryDiffStore::default()),
            Arc::new(InMemoryFindingStore::default()),
            AppConfig::default(),
        );
        (scheduler, datasets)
    }

    #[tokio::test]
    async fn tick_records_a_baseline_and_marks_connection_ok() {
        let (scheduler, datasets) = scheduler(false);
        let ds = Dataset::register("parcels".to_string(), connection(), 60);
        let id = ds.id;
        datasets.create(ds).await.unwrap();

        scheduler.run_change_detection_tick().await.unwrap();

        let updated = datasets.get(&id).await.unwrap().unwrap();
        assert!(updated.last_check_at.is_some());
        assert_eq!(updated.connection_status, ConnectionStatus::Ok);
    }

    #[tokio::test]
    async fn tick_records_connection_failure_without_aborting() {
        let (scheduler, datasets) = scheduler(true);
        let ds = Dataset::register("parcels".to_string(), connection(), 60);
        let id = ds.id;
        datasets.create(ds).await.unwrap();

        scheduler.run_change_detection_tick().await.unwrap();

        let updated = datasets.get(&id).await.unwrap().unwrap();
        assert_eq!(updated.connection_status, ConnectionStatus::Failed);
        assert!(updated.connection_error.is_some());
    }

    #[tokio::test]
    async fn quality_check_refuses_a_dataset_with_no_baseline() {
        let (scheduler, datasets) = scheduler(false);
        let ds = Dataset::register("parcels".to_string(), connection(), 60);
        let id = ds.id;
        datasets.create(ds).await.unwrap();

        let err = scheduler.dispatch_quality_check(id).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoBaseline(_)));
    }

    #[tokio::test]
    async fn quality_check_runs_after_a_baseline_exists() {
        let (scheduler, datasets) = scheduler(false);
        let ds = Dataset::register("parcels".to_string(), connection(), 60);
        let id = ds.id;
        datasets.create(ds).await.unwrap();
        scheduler.run_change_detection_tick().await.unwrap();

        scheduler.dispatch_quality_check(id).await.unwrap();
        let mut status = scheduler.status().get(&id).unwrap();
        for _ in 0..100 {
            if status.state != crate::types::RunState::Running {
                break;
            }
            tokio::task::yield_now().await;
            status = scheduler.status().get(&id).unwrap();
        }
        assert_eq!(status.state, crate::types::RunState::Completed);
        assert_eq!(status.progress.current, 1);
        assert_eq!(status.progress.total, 1);
    }

    #[tokio::test]
    async fn a_requested_shutdown_stops_the_next_change_detection_tick_early() {
        let (scheduler, datasets) = scheduler(false);
        let first = Dataset::register("parcels".to_string(), connection(), 60);
        let second = Dataset::register("roads".to_string(), connection(), 60);
        let first_id = first.id;
        let second_id = second.id;
        datasets.create(first).await.unwrap();
        datasets.create(second).await.unwrap();

        scheduler.request_shutdown();
        scheduler.run_change_detection_tick().await.unwrap();

        let first_after = datasets.get(&first_id).await.unwrap().unwrap();
        let second_after = datasets.get(&second_id).await.unwrap().unwrap();
        assert!(first_after.last_check_at.is_none());
        assert!(second_after.last_check_at.is_none());
    }

    #[tokio::test]
    async fn quality_check_refuses_a_second_concurrent_run() {
        let (scheduler, datasets) = scheduler(false);
        let ds = Dataset::register("parcels".to_string(), connection(), 60);
        let id = ds.id;
        datasets.create(ds).await.unwrap();
        scheduler.run_change_detection_tick().await.unwrap();

        scheduler.dispatch_quality_check(id).await.unwrap();
        let err = scheduler.dispatch_quality_check(id).await.unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRunning(_)));
    }
}
