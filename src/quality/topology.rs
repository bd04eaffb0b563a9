//! TOPOLOGY category: simplicity, combined cleanliness, ring orientation,
//! and point-count complexity warnings.

use crate::config::QualityThresholds;
use crate::source::FeatureRow;
use crate::types::{CheckCategory, CheckResult, DatasetId, Finding, SnapshotId};

use super::CategoryTester;

pub struct TopologyTester;

impl CategoryTester for TopologyTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Topology
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

        if row.is_simple {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Topology, CheckResult::Pass, "geometry is topologically simple"));
        } else {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Topology, CheckResult::Fail, "geometry is not simple (self-intersects)"));
        }

        if !row.is_topologically_clean {
            let culprit = if !row.is_valid && !row.is_simple {
                "validity and simplicity"
            } else if !row.is_valid {
                "validity"
            } else {
                "simplicity"
            };
            findings.push(
                Finding::new(dataset_id, snapshot_id, CheckCategory::Topology, CheckResult::Fail, "geometry fails the combined topological-cleanliness check")
                    .with_detail("failed_on", serde_json::Value::String(culprit.to_string())),
            );
        }

        if let Some(false) = row.is_ccw_oriented {
            // is_ccw_oriented = false means the exterior ring is clockwise.
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Topology, CheckResult::Warning, "polygon exterior ring is clockwise, not counter-clockwise"));
        }

        if row.num_points > thresholds.very_complex_geometry_point_threshold as i64 {
            findings.push(Finding::new(
                dataset_id,
                snapshot_id,
                CheckCategory::Topology,
                CheckResult::Warning,
                format!("point count {} exceeds the complexity cap of {}", row.num_points, thresholds.very_complex_geometry_point_threshold),
            ));
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::scoring::tests_support::base_row;

    #[test]
    fn clockwise_polygon_warns() {
        let tester = TopologyTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.is_ccw_oriented = Some(false);
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        assert!(findings.iter().any(|f| f.result == CheckResult::Warning && f.message.contains("clockwise")));
    }

    #[test]
    fn unclean_topology_names_the_culprit() {
        let tester = TopologyTester;
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.is_valid = false;
        row.is_topologically_clean = false;
        let findings = tester.run(DatasetId::generate(), SnapshotId::generate(), &row, &[], &thresholds);
        let f = findings.iter().find(|f| f.message.contains("combined")).unwrap();
        assert_eq!(f.detail.get("failed_on").unwrap(), "validity");
    }
}
