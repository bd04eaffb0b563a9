//! End-to-end scenarios driving the change detector and quality engine
//! together against the in-memory stores, without a real PostGIS table.

use std::collections::BTreeMap;
use std::sync::Arc;

use geowatch_core::store::{DiffFilter, InMemoryDiffStore, InMemoryFindingStore, InMemorySnapshotStore};
use geowatch_core::{
    AttributeValue, CheckCategory, CheckResult, ChangeDetector, DatasetId, DiffType, FeatureRow,
    QualityRunner, QualityThresholds, ReviewStatus, DiffStore, FindingStore,
};

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, AttributeValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), AttributeValue::Text(v.to_string()))).collect()
}

/// A clean, unremarkable feature with no anomalies: every scalar matches
/// what a well-formed, moderately sized geometry would report.
fn clean_row(geometry_wkb: Vec<u8>, geom_type: &str, attributes: BTreeMap<String, AttributeValue>) -> FeatureRow {
    FeatureRow {
        source_row_id: None,
        attributes,
        geometry_wkb,
        is_valid: true,
        validity_reason: None,
        is_simple: true,
        geom_area: 50.0,
        geom_length: 10.0,
        num_points: 5,
        geom_type: geom_type.to_string(),
        is_ccw_oriented: Some(true),
        is_topologically_clean: true,
        min_x: 0.0,
        max_x: 1.0,
        min_y: 0.0,
        max_y: 1.0,
    }
}

fn harness() -> (
    ChangeDetector<InMemorySnapshotStore, InMemoryDiffStore>,
    Arc<InMemorySnapshotStore>,
    Arc<InMemoryDiffStore>,
    Arc<InMemoryFindingStore>,
    QualityThresholds,
) {
    let snapshots = Arc::new(InMemorySnapshotStore::default());
    let diffs = Arc::new(InMemoryDiffStore::default());
    let findings = Arc::new(InMemoryFindingStore::default());
    let thresholds = QualityThresholds::default();
    let detector = ChangeDetector::new(snapshots.clone(), diffs.clone(), thresholds.clone());
    (detector, snapshots, diffs, findings, thresholds)
}

#[tokio::test]
async fn scenario_a_baseline_then_no_change() {
    let (detector, _snapshots, _diffs, _findings, _thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let f1 = clean_row(vec![1, 1], "POINT", attrs(&[("a", "1")]));
    let f2 = clean_row(vec![2, 2], "LINESTRING", attrs(&[("b", "2")]));
    let f3 = clean_row(vec![3, 3], "POLYGON", attrs(&[("c", "3")]));
    let rows = vec![f1, f2, f3];

    let baseline = detector.detect(dataset_id, &rows).await.unwrap();
    assert_eq!(baseline.new, 3);
    assert_eq!(baseline.diffs_created, 0);

    let rerun = detector.detect(dataset_id, &rows).await.unwrap();
    assert_eq!(rerun.unchanged, 3);
    assert_eq!(rerun.new + rerun.updated + rerun.deleted, 0);
    assert_eq!(rerun.diffs_created, 0);
}

#[tokio::test]
async fn scenario_b_pure_attribute_update() {
    let (detector, _snapshots, diffs, _findings, _thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let f1 = clean_row(vec![1, 1], "POINT", attrs(&[("a", "1")]));
    detector.detect(dataset_id, &[f1]).await.unwrap();

    let f1_updated = clean_row(vec![1, 1], "POINT", attrs(&[("a", "9")]));
    let report = detector.detect(dataset_id, &[f1_updated]).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.diffs_created, 1);

    let pending = diffs.list(DiffFilter { dataset_id: Some(dataset_id), ..Default::default() }).await.unwrap();
    assert_eq!(pending.len(), 1);
    let diff = &pending[0];
    assert_eq!(diff.diff_type, DiffType::Updated);
    assert!(!diff.geometry_changed);
    assert!(diff.attributes_changed);
    assert!(diff.old_snapshot_id.is_some());
    assert!(diff.new_snapshot_id.is_some());
}

#[tokio::test]
async fn scenario_c_deletion() {
    let (detector, _snapshots, diffs, _findings, _thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let f1 = clean_row(vec![1, 1], "POINT", attrs(&[("a", "1")]));
    let f2 = clean_row(vec![2, 2], "LINESTRING", attrs(&[("b", "2")]));
    detector.detect(dataset_id, &[f1, f2.clone()]).await.unwrap();

    let report = detector.detect(dataset_id, &[f2]).await.unwrap();
    assert_eq!(report.new, 0);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.diffs_created, 1);

    let pending = diffs.list(DiffFilter { dataset_id: Some(dataset_id), ..Default::default() }).await.unwrap();
    let deleted = pending.iter().find(|d| d.diff_type == DiffType::Deleted).expect("deletion diff recorded");
    assert!(deleted.old_snapshot_id.is_some());
    assert!(deleted.new_snapshot_id.is_none());
    assert_eq!(deleted.confidence_score, 1.0);
}

#[tokio::test]
async fn scenario_d_threshold_gating_suppresses_a_clean_new_feature() {
    let (detector, _snapshots, _diffs, _findings, _thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let f1 = clean_row(vec![1, 1], "POINT", attrs(&[("a", "1")]));
    detector.detect(dataset_id, &[f1.clone()]).await.unwrap();

    // A wholly different, but equally clean and moderately sized, polygon.
    let clean_replacement = clean_row(vec![9, 9, 9], "POLYGON", attrs(&[("c", "clean")]));
    let report = detector.detect(dataset_id, &[f1, clean_replacement]).await.unwrap();

    assert_eq!(report.new, 1);
    assert_eq!(report.diffs_created, 0, "a clean geometry's confidence score should sit below the flag threshold");
}

#[tokio::test]
async fn scenario_e_invalid_new_geometry_is_flagged_and_fails_quality_checks() {
    let (detector, snapshots, diffs, findings, thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let mut invalid = clean_row(vec![4, 4], "POLYGON", attrs(&[("d", "bad")]));
    invalid.is_valid = false;
    invalid.validity_reason = Some("self-intersection".to_string());
    invalid.is_simple = false;
    invalid.is_topologically_clean = false;

    let report = detector.detect(dataset_id, &[invalid.clone()]).await.unwrap();
    assert_eq!(report.new, 1);
    assert_eq!(report.diffs_created, 0, "first run against an empty dataset is a baseline, never diffed");

    // Re-run so this row is classified against a non-empty baseline.
    let dataset_id = DatasetId::generate();
    detector.detect(dataset_id, &[]).await.unwrap();
    let report = detector.detect(dataset_id, &[invalid.clone()]).await.unwrap();
    assert_eq!(report.new, 1);
    assert_eq!(report.diffs_created, 1);

    let pending = diffs.list(DiffFilter { dataset_id: Some(dataset_id), review_status: Some(ReviewStatus::Pending), ..Default::default() }).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].confidence_score >= 0.90);

    let runner = QualityRunner::new(snapshots, findings.clone(), thresholds);
    runner.run_for_dataset(dataset_id, &[invalid], None).await.unwrap();
    let summary = findings.summarise(&dataset_id).await.unwrap();
    assert!(summary.get(&(CheckCategory::Validity, CheckResult::Fail)).is_some());
    assert!(summary.get(&(CheckCategory::Topology, CheckResult::Fail)).is_some());
}

#[tokio::test]
async fn scenario_f_duplicate_import_is_recorded_and_flagged() {
    let (detector, snapshots, _diffs, findings, thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let f1 = clean_row(vec![1, 1], "POINT", attrs(&[("a", "1")]));
    detector.detect(dataset_id, &[f1.clone()]).await.unwrap();

    // A second row identical in geometry and attributes to F1.
    let report = detector.detect(dataset_id, &[f1.clone(), f1.clone()]).await.unwrap();
    assert_eq!(report.unchanged, 1, "the first copy still matches the recorded snapshot");
    assert_eq!(report.new + report.updated, 1, "the second, duplicate copy is recorded as its own feature");
    assert_eq!(report.diffs_created, 1);

    let runner = QualityRunner::new(snapshots, findings.clone(), thresholds);
    runner.run_for_dataset(dataset_id, &[f1.clone(), f1], None).await.unwrap();
    let summary = findings.summarise(&dataset_id).await.unwrap();
    assert!(summary.get(&(CheckCategory::Duplicate, CheckResult::Fail)).is_some());
    assert!(summary.get(&(CheckCategory::Duplicate, CheckResult::Warning)).is_some(), "the identical geometry must also raise the exact-geometry warning");
}

#[tokio::test]
async fn quality_check_findings_do_not_accumulate_across_runs() {
    let (detector, snapshots, _diffs, findings, thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let mut invalid = clean_row(vec![5, 5], "POLYGON", attrs(&[("e", "1")]));
    invalid.is_valid = false;
    detector.detect(dataset_id, &[invalid.clone()]).await.unwrap();

    let runner = QualityRunner::new(snapshots, findings.clone(), thresholds);
    runner.run_for_dataset(dataset_id, &[invalid.clone()], None).await.unwrap();
    let first_count: u64 = findings.summarise(&dataset_id).await.unwrap().values().sum();

    runner.run_for_dataset(dataset_id, &[invalid], None).await.unwrap();
    let second_count: u64 = findings.summarise(&dataset_id).await.unwrap().values().sum();

    assert_eq!(first_count, second_count, "re-running the quality check replaces, not appends to, its findings");
}

#[tokio::test]
async fn empty_source_produces_nothing() {
    let (detector, _snapshots, _diffs, _findings, _thresholds) = harness();
    let dataset_id = DatasetId::generate();

    let report = detector.detect(dataset_id, &[]).await.unwrap();
    assert_eq!(report.new, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.diffs_created, 0);

    let rerun = detector.detect(dataset_id, &[]).await.unwrap();
    assert_eq!(rerun.diffs_created, 0);
}
