//! Classifies the current state of a dataset's external table against its
//! snapshot history.
//!
//! Classification is purely hash-based: a feature's identity is its
//! geometry-hash lineage, never a source-side primary key (the source row
//! id is carried through for display only, never consulted here). The
//! first run against a dataset with no prior snapshots is a baseline: every
//! row is recorded but no diffs are raised, since there is nothing to
//! compare against yet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::QualityThresholds;
use crate::hash::{hash_attributes, hash_composite, hash_geometry, Digest};
use crate::source::FeatureRow;
use crate::store::{DiffStore, SnapshotStore};
use crate::types::{DatasetId, Diff, Snapshot};

/// Error surfaced by a detection run: either store backend can fail
/// independently, so this carries both without unifying their error types.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError<SE, DE>
where
    SE: std::error::Error + Send + Sync + 'static,
    DE: std::error::Error + Send + Sync + 'static,
{
    #[error("snapshot store error: {0}")]
    Snapshot(SE),
    #[error("diff store error: {0}")]
    Diff(DE),
}

/// Tally of one detection run, returned to the scheduler for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionReport {
    pub unchanged: usize,
    pub new: usize,
    pub updated: usize,
    pub deleted: usize,
    pub diffs_created: usize,
}

/// Detects and records changes for one dataset, given the rows currently on
/// the remote table.
pub struct ChangeDetector<S, D> {
    snapshots: Arc<S>,
    diffs: Arc<D>,
    thresholds: QualityThresholds,
}

fn attribute_pairs(row: &FeatureRow) -> Vec<(&str, String)> {
    row.attributes.iter().map(|(k, v)| (k.as_str(), v.to_hash_string())).collect()
}

impl<S, D> ChangeDetector<S, D>
where
    S: SnapshotStore,
    D: DiffStore,
{
    pub fn new(snapshots: Arc<S>, diffs: Arc<D>, thresholds: QualityThresholds) -> Self {
        Self { snapshots, diffs, thresholds }
    }

    /// Run one detection pass. `rows` is the full current contents of the
    /// dataset's external table, as read by a [`crate::source::SourceReader`].
    pub async fn detect(&self, dataset_id: DatasetId, rows: &[FeatureRow]) -> Result<DetectionReport, DetectorError<S::Error, D::Error>> {
        let existing = self.snapshots.list_by_dataset(&dataset_id).await.map_err(DetectorError::Snapshot)?;
        let is_baseline = existing.is_empty();

        // A multiset rather than a set: a duplicate-import row whose geometry
        // and attributes exactly match an existing snapshot must still be
        // recorded as its own feature once the one snapshot it matches has
        // already been claimed "unchanged" by an earlier row this pass.
        let mut known_composites: HashMap<Digest, usize> = HashMap::new();
        for s in &existing {
            *known_composites.entry(s.composite_hash).or_insert(0) += 1;
        }

        // The most recently recorded snapshot per geometry-hash lineage
        // stands in for "the currently live version" of that feature.
        let mut latest_by_geometry: HashMap<Digest, &Snapshot> = HashMap::new();
        for s in &existing {
            latest_by_geometry
                .entry(s.geometry_hash)
                .and_modify(|cur| {
                    if s.created_at > cur.created_at {
                        *cur = s;
                    }
                })
                .or_insert(s);
        }

        let mut report = DetectionReport::default();
        let mut seen_geometry: HashSet<Digest> = HashSet::new();

        for row in rows {
            let geometry_hash = hash_geometry(&row.geometry_wkb);
            let attributes_hash = hash_attributes(attribute_pairs(row));
            let composite_hash = hash_composite(geometry_hash, attributes_hash);

            seen_geometry.insert(geometry_hash);

            if let Some(remaining) = known_composites.get_mut(&composite_hash) {
                if *remaining > 0 {
                    *remaining -= 1;
                    report.unchanged += 1;
                    continue;
                }
            }

            let snapshot = Snapshot::new(
                dataset_id,
                row.source_row_id.clone(),
                geometry_hash,
                attributes_hash,
                row.geometry_wkb.clone(),
                row.attributes.clone(),
            );
            let inserted = self.snapshots.insert(snapshot).await.map_err(DetectorError::Snapshot)?;

            if is_baseline {
                report.new += 1;
                continue;
            }

            let scored = crate::quality::scoring::confidence(row, &self.thresholds);
            let already_pending = self
                .diffs
                .exists_pending_for_geometry(&dataset_id, geometry_hash)
                .await
                .map_err(DetectorError::Diff)?;

            if let Some(previous) = latest_by_geometry.get(&geometry_hash) {
                // An attribute change on an existing geometry lineage is
                // surfaced unconditionally: it is itself the signal, not a
                // geometry-quality symptom the confidence score measures.
                report.updated += 1;
                if !already_pending {
                    let diff = Diff::updated_feature(dataset_id, previous.id, inserted.id, geometry_hash, scored.score);
                    self.diffs.insert(diff).await.map_err(DetectorError::Diff)?;
                    report.diffs_created += 1;
                }
            } else {
                report.new += 1;
                if !already_pending && scored.is_problematic(&self.thresholds) {
                    let diff = Diff::new_feature(dataset_id, inserted.id, geometry_hash, scored.score);
                    self.diffs.insert(diff).await.map_err(DetectorError::Diff)?;
                    report.diffs_created += 1;
                }
            }
        }

        if !is_baseline {
            for (geometry_hash, snapshot) in &latest_by_geometry {
                if seen_geometry.contains(geometry_hash) {
                    continue;
                }
                report.deleted += 1;
                let already_pending = self
                    .diffs
                    .exists_pending_for_geometry(&dataset_id, *geometry_hash)
                    .await
                    .map_err(DetectorError::Diff)?;
                if !already_pending {
                    let diff = Diff::deleted_feature(dataset_id, snapshot.id, *geometry_hash);
                    self.diffs.insert(diff).await.map_err(DetectorError::Diff)?;
                    report.diffs_created += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDiffStore, InMemorySnapshotStore};
    use crate::types::{AttributeValue, ReviewStatus};
    use std::collections::BTreeMap;

    fn row(geometry_wkb: Vec<u8>, name: &str) -> FeatureRow {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), AttributeValue::Text(name.to_string()));
        FeatureRow {
            source_row_id: None,
            attributes,
            geometry_wkb,
            is_valid: true,
            validity_reason: None,
            is_simple: true,
            geom_area: 100.0,
            geom_length: 0.0,
            num_points: 5,
            geom_type: "POLYGON".to_string(),
            is_ccw_oriented: Some(true),
            is_topologically_clean: true,
            min_x: 0.0,
            max_x: 1.0,
            min_y: 0.0,
            max_y: 1.0,
        }
    }

    fn detector() -> ChangeDetector<InMemorySnapshotStore, InMemoryDiffStore> {
        ChangeDetector::new(
            Arc::new(InMemorySnapshotStore::default()),
            Arc::new(InMemoryDiffStore::default()),
            QualityThresholds::default(),
        )
    }

    #[tokio::test]
    async fn first_run_is_a_baseline_with_no_diffs() {
        let detector = detector();
        let dataset_id = DatasetId::generate();
        let rows = vec![row(vec![1], "a"), row(vec![2], "b")];
        let report = detector.detect(dataset_id, &rows).await.unwrap();
        assert_eq!(report.new, 2);
        assert_eq!(report.diffs_created, 0);
    }

    #[tokio::test]
    async fn unchanged_rows_raise_nothing_on_second_run() {
        let detector = detector();
        let dataset_id = DatasetId::generate();
        let rows = vec![row(vec![1], "a")];
        detector.detect(dataset_id, &rows).await.unwrap();
        let report = detector.detect(dataset_id, &rows).await.unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.diffs_created, 0);
    }

    #[tokio::test]
    async fn attribute_change_with_stable_geometry_is_updated() {
        let detector = detector();
        let dataset_id = DatasetId::generate();
        detector.detect(dataset_id, &[row(vec![1], "a")]).await.unwrap();
        let report = detector.detect(dataset_id, &[row(vec![1], "b")]).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.diffs_created, 1);
    }

    #[tokio::test]
    async fn missing_row_on_second_run_is_deleted() {
        let detector = detector();
        let dataset_id = DatasetId::generate();
        detector.detect(dataset_id, &[row(vec![1], "a")]).await.unwrap();
        let report = detector.detect(dataset_id, &[]).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.diffs_created, 1);
    }

    #[tokio::test]
    async fn idempotent_rerun_does_not_duplicate_pending_diffs() {
        let snapshots = Arc::new(InMemorySnapshotStore::default());
        let diffs = Arc::new(InMemoryDiffStore::default());
        let detector = ChangeDetector::new(snapshots, diffs.clone(), QualityThresholds::default());
        let dataset_id = DatasetId::generate();
        detector.detect(dataset_id, &[row(vec![1], "a")]).await.unwrap();
        detector.detect(dataset_id, &[row(vec![1], "b")]).await.unwrap();
        detector.detect(dataset_id, &[row(vec![1], "b")]).await.unwrap();
        let pending = diffs
            .list(crate::store::DiffFilter { dataset_id: Some(dataset_id), review_status: Some(ReviewStatus::Pending), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }
}
