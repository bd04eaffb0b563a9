//! Classified changes awaiting or past human review.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::Digest;

use super::ids::{DatasetId, DiffId, SnapshotId};

/// The three-way classification a change falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffType {
    New,
    Updated,
    Deleted,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiffType::New => "NEW",
            DiffType::Updated => "UPDATED",
            DiffType::Deleted => "DELETED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DiffType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(DiffType::New),
            "UPDATED" => Ok(DiffType::Updated),
            "DELETED" => Ok(DiffType::Deleted),
            other => Err(format!("unknown diff type: {other}")),
        }
    }
}

/// Review state, one-shot once it leaves `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Accepted => "ACCEPTED",
            ReviewStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// A classified change between two (or one) snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    pub id: DiffId,
    pub dataset_id: DatasetId,
    pub diff_type: DiffType,
    pub old_snapshot_id: Option<SnapshotId>,
    pub new_snapshot_id: Option<SnapshotId>,
    /// Geometry hash of the feature this diff concerns, carried
    /// redundantly from the snapshot so idempotence checks don't require a
    /// join back to the snapshot store.
    pub geometry_hash: Digest,
    pub geometry_changed: bool,
    pub attributes_changed: bool,
    pub confidence_score: f64,
    pub review_status: ReviewStatus,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Error attempting an invalid review transition.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("diff {0} has already been reviewed and cannot be reviewed again")]
    AlreadyReviewed(DiffId),
    #[error("cannot review a diff into the PENDING state")]
    CannotReviewToPending,
}

impl Diff {
    #[allow(clippy::too_many_arguments)]
    fn new(
        dataset_id: DatasetId,
        diff_type: DiffType,
        old_snapshot_id: Option<SnapshotId>,
        new_snapshot_id: Option<SnapshotId>,
        geometry_hash: Digest,
        geometry_changed: bool,
        attributes_changed: bool,
        confidence_score: f64,
    ) -> Self {
        Diff {
            id: DiffId::generate(),
            dataset_id,
            diff_type,
            old_snapshot_id,
            new_snapshot_id,
            geometry_hash,
            geometry_changed,
            attributes_changed,
            confidence_score: confidence_score.clamp(0.0, 1.0),
            review_status: ReviewStatus::Pending,
            reviewer: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }

    /// A feature observed whose geometry hash has no match among prior
    /// snapshots.
    pub fn new_feature(dataset_id: DatasetId, new_snapshot_id: SnapshotId, geometry_hash: Digest, confidence_score: f64) -> Self {
        Diff::new(dataset_id, DiffType::New, None, Some(new_snapshot_id), geometry_hash, true, false, confidence_score)
    }

    /// A feature whose geometry hash matched a prior snapshot but whose
    /// attributes did not.
    pub fn updated_feature(
        dataset_id: DatasetId,
        old_snapshot_id: SnapshotId,
        new_snapshot_id: SnapshotId,
        geometry_hash: Digest,
        confidence_score: f64,
    ) -> Self {
        Diff::new(dataset_id, DiffType::Updated, Some(old_snapshot_id), Some(new_snapshot_id), geometry_hash, false, true, confidence_score)
    }

    /// A prior snapshot whose composite hash was absent from the latest
    /// scan.
    pub fn deleted_feature(dataset_id: DatasetId, old_snapshot_id: SnapshotId, geometry_hash: Digest) -> Self {
        Diff::new(dataset_id, DiffType::Deleted, Some(old_snapshot_id), None, geometry_hash, true, false, 1.0)
    }

    /// Apply a one-shot review transition.
    pub fn review(&mut self, status: ReviewStatus, reviewer: String) -> Result<(), ReviewError> {
        if self.review_status != ReviewStatus::Pending {
            return Err(ReviewError::AlreadyReviewed(self.id));
        }
        if status == ReviewStatus::Pending {
            return Err(ReviewError::CannotReviewToPending);
        }
        self.review_status = status;
        self.reviewer = Some(reviewer);
        self.reviewed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gh() -> Digest {
        crate::hash::hash_geometry(b"wkb")
    }

    #[test]
    fn new_feature_has_no_old_reference() {
        let d = Diff::new_feature(DatasetId::generate(), SnapshotId::generate(), gh(), 0.8);
        assert_eq!(d.diff_type, DiffType::New);
        assert!(d.old_snapshot_id.is_none());
        assert!(d.new_snapshot_id.is_some());
    }

    #[test]
    fn deleted_feature_has_no_new_reference_and_full_confidence() {
        let d = Diff::deleted_feature(DatasetId::generate(), SnapshotId::generate(), gh());
        assert_eq!(d.diff_type, DiffType::Deleted);
        assert!(d.new_snapshot_id.is_none());
        assert_eq!(d.confidence_score, 1.0);
    }

    #[test]
    fn review_is_one_shot() {
        let mut d = Diff::new_feature(DatasetId::generate(), SnapshotId::generate(), gh(), 0.8);
        d.review(ReviewStatus::Accepted, "alice".to_string()).unwrap();
        let err = d.review(ReviewStatus::Rejected, "bob".to_string()).unwrap_err();
        assert!(matches!(err, ReviewError::AlreadyReviewed(_)));
    }

    #[test]
    fn cannot_review_back_to_pending() {
        let mut d = Diff::new_feature(DatasetId::generate(), SnapshotId::generate(), gh(), 0.8);
        let err = d.review(ReviewStatus::Pending, "alice".to_string()).unwrap_err();
        assert!(matches!(err, ReviewError::CannotReviewToPending));
    }

    #[test]
    fn confidence_score_is_clamped() {
        let d = Diff::new_feature(DatasetId::generate(), SnapshotId::generate(), gh(), 1.5);
        assert_eq!(d.confidence_score, 1.0);
        let d = Diff::new_feature(DatasetId::generate(), SnapshotId::generate(), gh(), -0.5);
        assert_eq!(d.confidence_score, 0.0);
    }
}
