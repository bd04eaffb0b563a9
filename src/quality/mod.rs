//! The spatial quality engine: a pluggable set of category testers plus the
//! runner that wires them to storage.

pub mod area;
pub mod duplicate;
pub mod geometry;
pub mod scoring;
pub mod shape;
pub mod topology;
pub mod validity;

use std::sync::Arc;

use crate::config::QualityThresholds;
use crate::source::FeatureRow;
use crate::store::{FindingStore, SnapshotStore};
use crate::types::{CheckCategory, DatasetId, Finding, FindingSummary, Snapshot, SnapshotId};

/// One independent spatial check, run once per feature per check.
///
/// Synchronous and object-safe by design: the store traits' associated
/// `Error` types are not dyn-safe, so any store access a tester needs
/// (duplicate detection's sibling lookup) is pre-loaded once by
/// [`QualityRunner`] and handed in as a slice rather than queried directly.
pub trait CategoryTester: Send + Sync {
    fn category(&self) -> CheckCategory;

    fn run(
        &self,
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        row: &FeatureRow,
        siblings: &[Snapshot],
        thresholds: &QualityThresholds,
    ) -> Vec<Finding>;
}

/// Progress and cancellation hook for a quality-check run. The runner calls
/// [`ProgressReporter::report`] once before each feature is tested; a `true`
/// return stops the run early (whatever findings were gathered so far are
/// still written, so a cancelled run still replaces stale results rather
/// than leaving them in place).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, phase: &str, current: usize, total: usize) -> bool;
}

/// Build the default tester roster, filtered by the thresholds' per-category
/// enable flags. `enable_type_specific` gates the three shape testers
/// together; the others each carry their own flag.
fn default_testers(thresholds: &QualityThresholds) -> Vec<Box<dyn CategoryTester>> {
    let mut testers: Vec<Box<dyn CategoryTester>> = Vec::new();
    if thresholds.enable_validity {
        testers.push(Box::new(validity::ValidityTester));
    }
    if thresholds.enable_topology {
        testers.push(Box::new(topology::TopologyTester));
    }
    if thresholds.enable_area {
        testers.push(Box::new(area::AreaTester));
    }
    if thresholds.enable_duplicate {
        testers.push(Box::new(duplicate::DuplicateTester));
    }
    if thresholds.enable_type_specific {
        testers.push(Box::new(shape::PolygonShapeTester));
        testers.push(Box::new(shape::LinestringShapeTester));
        testers.push(Box::new(shape::PointShapeTester));
    }
    testers
}

/// Error surfaced by a quality-check run: either store backend can fail
/// independently, so this carries both without unifying their error types.
#[derive(Debug, thiserror::Error)]
pub enum QualityRunError<SE, FE>
where
    SE: std::error::Error + Send + Sync + 'static,
    FE: std::error::Error + Send + Sync + 'static,
{
    #[error("snapshot store error: {0}")]
    Snapshot(SE),
    #[error("finding store error: {0}")]
    Finding(FE),
}

/// Orchestrates one quality-check run for one dataset: pre-loads sibling
/// snapshots once, dispatches every enabled tester per feature, replaces the
/// dataset's prior findings with the new set, and returns a summary.
pub struct QualityRunner<S, F> {
    snapshots: Arc<S>,
    findings: Arc<F>,
    thresholds: QualityThresholds,
}

impl<S, F> QualityRunner<S, F>
where
    S: SnapshotStore,
    F: FindingStore,
{
    pub fn new(snapshots: Arc<S>, findings: Arc<F>, thresholds: QualityThresholds) -> Self {
        Self { snapshots, findings, thresholds }
    }

    /// Run every enabled category tester over `rows`, matching each row to
    /// its recorded snapshot by geometry hash (rows are expected to already
    /// have a snapshot on file from a prior change-detection pass; a row
    /// with no match is skipped rather than failing the whole run, since a
    /// quality check racing ahead of change detection is a scheduling
    /// detail, not a data error).
    ///
    /// `progress`, if given, is reported between features and may signal
    /// early cancellation; see [`ProgressReporter`].
    pub async fn run_for_dataset(
        &self,
        dataset_id: DatasetId,
        rows: &[FeatureRow],
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<FindingSummary, QualityRunError<S::Error, F::Error>> {
        let siblings = self.snapshots.list_by_dataset(&dataset_id).await.map_err(QualityRunError::Snapshot)?;
        let testers = default_testers(&self.thresholds);

        let total = rows.len();
        let mut all_findings = Vec::new();
        for (processed, row) in rows.iter().enumerate() {
            if let Some(p) = progress {
                if p.report("testing features", processed, total) {
                    break;
                }
            }
            let geometry_hash = crate::hash::hash_geometry(&row.geometry_wkb);
            let Some(snapshot) = siblings.iter().find(|s| s.geometry_hash == geometry_hash) else {
                continue;
            };
            for tester in &testers {
                all_findings.extend(tester.run(dataset_id, snapshot.id, row, &siblings, &self.thresholds));
            }
        }
        if let Some(p) = progress {
            p.report("writing findings", total, total);
        }

        self.findings.delete_by_dataset(&dataset_id).await.map_err(QualityRunError::Finding)?;
        self.findings.insert_many(all_findings).await.map_err(QualityRunError::Finding)?;
        self.findings.summarise(&dataset_id).await.map_err(QualityRunError::Finding)
    }
}
