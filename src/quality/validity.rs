//! VALIDITY category: server-reported validity plus checks the derived
//! scalars don't directly expose (coordinate magnitude, NaN/∞, point
//! count floors).

use crate::config::QualityThresholds;
use crate::source::FeatureRow;
use crate::types::{CheckCategory, CheckResult, DatasetId, Finding, SnapshotId};

use super::CategoryTester;

pub struct ValidityTester;

fn min_points_for_type(geom_type: &str) -> i64 {
    let t = geom_type.to_ascii_uppercase();
    if t.contains("POLYGON") {
        4
    } else if t.contains("LINESTRING") {
        2
    } else {
        1
    }
}

impl CategoryTester for ValidityTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Validity
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

        if row.is_valid {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Validity, CheckResult::Pass, "geometry is valid"));
        } else {
            let reason = row.validity_reason.clone().unwrap_or_else(|| "unknown".to_string());
            findings.push(
                Finding::new(dataset_id, snapshot_id, CheckCategory::Validity, CheckResult::Fail, format!("geometry is invalid: {reason}"))
                    .with_detail("reason", serde_json::Value::String(reason)),
            );
        }

        let coords = [row.min_x, row.max_x, row.min_y, row.max_y];
        let decoded = super::geometry::decode(&row.geometry_wkb);
        let per_coordinate_non_finite = decoded.as_ref().is_some_and(super::geometry::has_non_finite_coordinate);
        if coords.iter().any(|c| !c.is_finite()) || per_coordinate_non_finite {
            findings.push(Finding::new(
                dataset_id,
                snapshot_id,
                CheckCategory::Validity,
                CheckResult::Fail,
                "geometry contains non-finite coordinates (NaN or infinity)",
            ));
        } else if coords.iter().any(|c| c.abs() > thresholds.max_coordinate_magnitude) {
            findings.push(
                Finding::new(dataset_id, snapshot_id, CheckCategory::Validity, CheckResult::Fail, "coordinate magnitude exceeds configured bound")
                    .with_detail("max_coordinate_magnitude", serde_json::json!(thresholds.max_coordinate_magnitude)),
            );
        }

        let min_points = min_points_for_type(&row.geom_type);
        if row.num_points < min_points {
            findings.push(Finding::new(
                dataset_id,
                snapshot_id,
                CheckCategory::Validity,
                CheckResult::Fail,
                format!("point count {} is below the minimum {} for {}", row.num_points, min_points, row.geom_type),
            ));
        }

        if !row.is_point_type() && row.num_points <= 1 {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Validity, CheckResult::Fail, "degenerate geometry with at most one point"));
        }

        if row.geom_type.is_empty() {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Validity, CheckResult::Warning, "unrecognised geometry type"));
        }

        findings
    }
}

impl FeatureRow {
    pub(crate) fn is_point_type(&self) -> bool {
        self.geom_type.eq_ignore_ascii_case("POINT") || self.geom_type.eq_ignore_ascii_case("MULTIPOINT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::scoring::tests_support::base_row;

    #[test]
    fn valid_geometry_yields_single_pass() {
        let tester = ValidityTester;
        let thresholds = QualityThresholds::default();
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &base_row(), &[], &thresholds);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].result, CheckResult::Pass);
    }

    #[test]
    fn invalid_geometry_fails() {
        let tester = ValidityTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.is_valid = false;
        row.validity_reason = Some("Self-intersection".to_string());
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        assert!(findings.iter().any(|f| f.result == CheckResult::Fail));
    }

    #[test]
    fn nan_coordinates_fail() {
        let tester = ValidityTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.max_x = f64::NAN;
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        assert!(findings.iter().any(|f| f.message.contains("non-finite")));
    }
}
