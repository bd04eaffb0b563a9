//! DUPLICATE category: exact and near-duplicate geometry detection against
//! sibling snapshots already on record for the same dataset.

use crate::config::QualityThresholds;
use crate::source::FeatureRow;
use crate::types::{CheckCategory, CheckResult, DatasetId, Finding, Snapshot, SnapshotId};

use super::CategoryTester;

pub struct DuplicateTester;

/// How many sibling ids to surface as a sample when a duplicate group is
/// large; the full count is always included separately.
const MAX_SAMPLE: usize = 5;

impl CategoryTester for DuplicateTester {
    fn category(&self) -> CheckCategory {
        CheckCategory::Duplicate
    }

    fn run(
        &self,
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        row: &FeatureRow,
        siblings: &[Snapshot],
        thresholds: &QualityThresholds,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        if !thresholds.enable_duplicate {
            return findings;
        }

        let geometry_hash = crate::hash::hash_geometry(&row.geometry_wkb);
        let composite_hash = crate::hash::hash_composite(geometry_hash, crate::hash::hash_attributes(attribute_pairs(row)));

        // Sub-check 1: composite duplicate (same geometry and same
        // attributes as another snapshot).
        let composite_matches: Vec<&Snapshot> = siblings.iter().filter(|s| s.id != snapshot_id && s.composite_hash == composite_hash).collect();
        if !composite_matches.is_empty() {
            findings.push(
                Finding::new(
                    dataset_id,
                    snapshot_id,
                    CheckCategory::Duplicate,
                    CheckResult::Fail,
                    "feature is an exact duplicate (geometry and attributes) of another snapshot",
                )
                .with_detail("duplicate_count", serde_json::json!(composite_matches.len()))
                .with_detail("sample_snapshot_ids", sample_ids(&composite_matches)),
            );
        }

        // Sub-check 2: exact-geometry duplicate (same geometry hash,
        // regardless of whether attributes also match — an identical
        // import satisfies both this and the composite check above).
        let geometry_matches: Vec<&Snapshot> = siblings.iter().filter(|s| s.id != snapshot_id && s.geometry_hash == geometry_hash).collect();
        if !geometry_matches.is_empty() {
            findings.push(
                Finding::new(
                    dataset_id,
                    snapshot_id,
                    CheckCategory::Duplicate,
                    CheckResult::Warning,
                    "geometry is identical to another snapshot's, but attributes differ",
                )
                .with_detail("duplicate_count", serde_json::json!(geometry_matches.len()))
                .with_detail("sample_snapshot_ids", sample_ids(&geometry_matches)),
            );
        }

        // Sub-check 3: near-duplicate (different canonical geometry hash,
        // but spatially equal — e.g. a ring that starts at a different
        // vertex, or coordinates re-ordered within a multi-geometry).
        if let Some(row_geom) = super::geometry::decode(&row.geometry_wkb) {
            let near_matches: Vec<&Snapshot> = siblings
                .iter()
                .filter(|s| s.id != snapshot_id && s.geometry_hash != geometry_hash)
                .filter(|s| super::geometry::decode(&s.geometry_wkb).is_some_and(|g| super::geometry::spatially_equal(&row_geom, &g)))
                .collect();
            if !near_matches.is_empty() {
                findings.push(
                    Finding::new(
                        dataset_id,
                        snapshot_id,
                        CheckCategory::Duplicate,
                        CheckResult::Warning,
                        "geometry is spatially equal to another snapshot's under a different canonical representation",
                    )
                    .with_detail("duplicate_count", serde_json::json!(near_matches.len()))
                    .with_detail("sample_snapshot_ids", sample_ids(&near_matches)),
                );
            }
        }

        if findings.is_empty() {
            findings.push(Finding::new(dataset_id, snapshot_id, CheckCategory::Duplicate, CheckResult::Pass, "no duplicate siblings found"));
        }
        findings
    }
}

fn attribute_pairs(row: &FeatureRow) -> Vec<(&str, String)> {
    row.attributes.iter().map(|(k, v)| (k.as_str(), v.to_hash_string())).collect()
}

fn sample_ids(matches: &[&Snapshot]) -> serde_json::Value {
    let ids: Vec<String> = matches.iter().take(MAX_SAMPLE).map(|s| s.id.to_string()).collect();
    serde_json::json!(ids)
}
