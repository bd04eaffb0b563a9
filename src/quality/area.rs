//! AREA category (size): zero/negative area or length, large-geometry
//! warnings, and cross-metric shape analysis.

use crate::config::QualityThresholds;
use crate::source::FeatureRow;
use crate::types::{CheckCategory, CheckResult, DatasetId, Finding, SnapshotId};

use super::CategoryTester;

pub struct AreaTester;

/// A narrow-shape compactness floor below which a polygon is suspiciously
/// sliver-like. A cross-metric WARNING, independent of the confidence
/// scorer's tiers.
const COMPACTNESS_WARNING_THRESHOLD: f64 = 0.02;

impl CategoryTester for AreaTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Area
    }

    fn run(
        &self,
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        row: &FeatureRow,
        _siblings: &[crate::types::Snapshot],
        thresholds: &QualityThresholds,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        let geom_type = row.geom_type.to_ascii_uppercase();

        if geom_type.contains("POLYGON") {
            if row.geom_area <= thresholds.zero_area_threshold {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Fail, "polygon has zero or negative area"));
            } else if row.geom_area < thresholds.small_area_threshold {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Warning, "polygon area is below the small-area threshold"));
            } else if row.geom_area > thresholds.large_area_threshold {
                findings.push(
                    Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Warning, "polygon area exceeds the large-area threshold")
                        .with_detail("area", serde_json::json!(row.geom_area)),
                );
            } else {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Pass, "polygon area is within bounds"));
            }

            let width = (row.max_x - row.min_x).abs();
            let height = (row.max_y - row.min_y).abs();
            let perimeter_estimate = 2.0 * (width + height);
            if perimeter_estimate > 0.0 {
                let compactness = row.geom_area / (perimeter_estimate * perimeter_estimate);
                if compactness < COMPACTNESS_WARNING_THRESHOLD {
                    findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Warning, "polygon shape is narrow/sliver-like (low compactness)"));
                }
            }
        } else if geom_type.contains("LINESTRING") {
            if row.geom_length <= thresholds.zero_length_threshold {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Fail, "line has zero or negative length"));
            } else if row.geom_length < thresholds.small_length_threshold {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Warning, "line length is below the small-length threshold"));
            } else if row.geom_length > thresholds.large_length_threshold {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Warning, "line length exceeds the large-length threshold"));
            } else {
                findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Pass, "line length is within bounds"));
            }

            if row.geom_length > 0.0 {
                let density = row.num_points as f64 / row.geom_length;
                if !(1e-6..=1000.0).contains(&density) {
                    findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Warning, "vertex density per unit length is outside the expected band"));
                }
            }
        } else {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Area, CheckResult::Pass, "no size checks apply to this geometry type"));
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::scoring::tests_support::base_row;

    #[test]
    fn zero_area_polygon_fails() {
        let tester = AreaTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.geom_area = 0.0;
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        assert!(findings.iter().any(|f| f.result == CheckResult::Fail));
    }

    #[test]
    fn large_polygon_warns() {
        let tester = AreaTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.geom_area = thresholds.large_area_threshold + 1.0;
        row.min_x = 0.0;
        row.max_x = 2000.0;
        row.min_y = 0.0;
        row.max_y = 2000.0;
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        assert!(findings.iter().any(|f| f.result == CheckResult::Warning && f.message.contains("large-area")));
    }

    #[test]
    fn zero_length_line_fails() {
        let tester = AreaTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.geom_type = "LINESTRING".to_string();
        row.geom_length = 0.0;
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        assert!(findings.iter().any(|f| f.result == CheckResult::Fail));
    }
}
