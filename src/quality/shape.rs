//! Optional type-specific testers (POLYGON / LINESTRING / POINT), gated by
//! `enable_type_specific`. Stricter than the baseline AREA/TOPOLOGY
//! categories: they encode shape expectations that only make sense for one
//! geometry family, not general-purpose thresholds.

use crate::config::QualityThresholds;
use crate::source::FeatureRow;
use crate::types::{CheckCategory, CheckResult, DatasetId, Finding, Snapshot, SnapshotId};

use super::CategoryTester;

pub struct PolygonShapeTester;
pub struct LinestringShapeTester;
pub struct PointShapeTester;

impl CategoryTester for PolygonShapeTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Polygon
    }

    fn run(
        &self,
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        row: &FeatureRow,
        _siblings: &[Snapshot],
        thresholds: &QualityThresholds,
    ) -> Vec<Finding> {
        if !thresholds.enable_type_specific || !row.geom_type.to_ascii_uppercase().contains("POLYGON") {
            return Vec::new();
        }

        let mut findings = Vec::new();
        let ring_points = row.num_points;
        if ring_points >= 4 {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Polygon, CheckResult::Pass, "ring closes with at least the minimum four points"));
        } else {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Polygon, CheckResult::Fail, "ring has fewer than the minimum four points to close"));
        }
        findings
    }
}

impl CategoryTester for LinestringShapeTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Linestring
    }

    fn run(
        &self,
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        row: &FeatureRow,
        _siblings: &[Snapshot],
        thresholds: &QualityThresholds,
    ) -> Vec<Finding> {
        if !thresholds.enable_type_specific || !row.geom_type.to_ascii_uppercase().contains("LINESTRING") {
            return Vec::new();
        }

        let mut findings = Vec::new();
        if row.num_points < 2 {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Linestring, CheckResult::Fail, "line has fewer than two vertices"));
        } else {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Linestring, CheckResult::Pass, "line has at least two vertices"));
        }
        findings
    }
}

impl CategoryTester for PointShapeTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Point
    }

    fn run(
        &self,
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        row: &FeatureRow,
        _siblings: &[Snapshot],
        thresholds: &QualityThresholds,
    ) -> Vec<Finding> {
        if !thresholds.enable_type_specific || !row.is_point_type() {
            return Vec::new();
        }

        let mut findings = Vec::new();
        if row.min_x == row.max_x && row.min_y == row.max_y {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Point, CheckResult::Pass, "point coordinates are well-formed"));
        } else {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Point, CheckResult::Warning, "point bounding box is not degenerate (unexpected for a single point)"));
        }
        findings
    }
}
