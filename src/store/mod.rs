//! Storage backends: one narrow async trait per entity.
//!
//! Implementations must guarantee deterministic ordering of results so
//! tests against the in-memory backend are reproducible.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{Dataset, DatasetId, Diff, DiffId, Finding, FindingSummary, ReviewStatus, Snapshot, SnapshotId};

/// Filter applied to [`DiffStore::list`].
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    pub dataset_id: Option<DatasetId>,
    pub review_status: Option<ReviewStatus>,
    pub diff_type: Option<crate::types::DiffType>,
    pub limit: usize,
    pub offset: usize,
}

/// Storage for dataset registrations.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn create(&self, dataset: Dataset) -> Result<Dataset, Self::Error>;
    async fn get(&self, id: &DatasetId) -> Result<Option<Dataset>, Self::Error>;
    async fn list_active(&self) -> Result<Vec<Dataset>, Self::Error>;
    async fn list_all(&self) -> Result<Vec<Dataset>, Self::Error>;
    async fn update(&self, dataset: Dataset) -> Result<Dataset, Self::Error>;
    async fn deactivate(&self, id: &DatasetId) -> Result<(), Self::Error>;
}

/// Storage for immutable feature-version snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn insert(&self, snapshot: Snapshot) -> Result<Snapshot, Self::Error>;
    async fn list_by_dataset(&self, dataset_id: &DatasetId) -> Result<Vec<Snapshot>, Self::Error>;
    async fn find_by_geometry_hash(&self, dataset_id: &DatasetId, hash: crate::hash::Digest) -> Result<Vec<Snapshot>, Self::Error>;
    async fn find_by_composite_hash(&self, dataset_id: &DatasetId, hash: crate::hash::Digest) -> Result<Vec<Snapshot>, Self::Error>;
    async fn get(&self, id: &SnapshotId) -> Result<Option<Snapshot>, Self::Error>;
    async fn count(&self, dataset_id: &DatasetId) -> Result<u64, Self::Error>;
    async fn delete_all(&self, dataset_id: &DatasetId) -> Result<(), Self::Error>;
}

/// Storage for classified changes.
#[async_trait]
pub trait DiffStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn insert(&self, diff: Diff) -> Result<Diff, Self::Error>;
    async fn list(&self, filter: DiffFilter) -> Result<Vec<Diff>, Self::Error>;
    async fn get(&self, id: &DiffId) -> Result<Option<Diff>, Self::Error>;
    async fn update_review(&self, id: &DiffId, status: ReviewStatus, reviewer: String) -> Result<Diff, Self::Error>;
    async fn count_pending(&self, dataset_id: &DatasetId) -> Result<u64, Self::Error>;
    async fn exists_pending_for_geometry(&self, dataset_id: &DatasetId, geometry_hash: crate::hash::Digest) -> Result<bool, Self::Error>;
    async fn delete_by_dataset(&self, dataset_id: &DatasetId) -> Result<(), Self::Error>;
}

/// Storage for quality-check findings.
#[async_trait]
pub trait FindingStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn insert_many(&self, findings: Vec<Finding>) -> Result<(), Self::Error>;
    async fn delete_by_dataset(&self, dataset_id: &DatasetId) -> Result<(), Self::Error>;
    async fn summarise(&self, dataset_id: &DatasetId) -> Result<FindingSummary, Self::Error>;
}

pub use memory::{
    InMemoryDatasetStore, InMemoryDiffStore, InMemoryFindingStore, InMemorySnapshotStore, InMemoryStoreError,
};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresStore, PostgresStoreError};
