//! Deterministic in-memory store implementations, used by tests and by
//! any deployment that does not need cross-process persistence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::hash::Digest;
use crate::types::{Dataset, DatasetId, Diff, DiffId, Finding, FindingSummary, ReviewStatus, Snapshot, SnapshotId};

use super::{DatasetStore, DiffFilter, DiffStore, FindingStore, SnapshotStore};

/// Error type shared by every in-memory store; the only failure mode is a
/// lookup miss on an operation that requires the row to already exist.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryStoreError {
    #[error("dataset {0} not found")]
    DatasetNotFound(DatasetId),
    #[error("diff {0} not found or already reviewed")]
    DiffUnavailable(DiffId),
}

/// In-memory dataset registry, keyed by [`DatasetId`] for deterministic
/// iteration order.
#[derive(Default)]
pub struct InMemoryDatasetStore {
    rows: RwLock<BTreeMap<DatasetId, Dataset>>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetStore for InMemoryDatasetStore {
    type Error = InMemoryStoreError;

    async fn create(&self, dataset: Dataset) -> Result<Dataset, Self::Error> {
        self.rows.write().insert(dataset.id, dataset.clone());
        Ok(dataset)
    }

    async fn get(&self, id: &DatasetId) -> Result<Option<Dataset>, Self::Error> {
        Ok(self.rows.read().get(id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Dataset>, Self::Error> {
        Ok(self.rows.read().values().filter(|d| d.active).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<Dataset>, Self::Error> {
        Ok(self.rows.read().values().cloned().collect())
    }

    async fn update(&self, dataset: Dataset) -> Result<Dataset, Self::Error> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&dataset.id) {
            return Err(InMemoryStoreError::DatasetNotFound(dataset.id));
        }
        rows.insert(dataset.id, dataset.clone());
        Ok(dataset)
    }

    async fn deactivate(&self, id: &DatasetId) -> Result<(), Self::Error> {
        let mut rows = self.rows.write();
        let ds = rows.get_mut(id).ok_or(InMemoryStoreError::DatasetNotFound(*id))?;
        ds.active = false;
        Ok(())
    }
}

/// In-memory snapshot store with secondary indexes mirroring the
/// mandatory GiST-style indexing described for the real schema.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    rows: RwLock<BTreeMap<SnapshotId, Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    type Error = InMemoryStoreError;

    async fn insert(&self, snapshot: Snapshot) -> Result<Snapshot, Self::Error> {
        self.rows.write().insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    async fn list_by_dataset(&self, dataset_id: &DatasetId) -> Result<Vec<Snapshot>, Self::Error> {
        Ok(self.rows.read().values().filter(|s| &s.dataset_id == dataset_id).cloned().collect())
    }

    async fn find_by_geometry_hash(&self, dataset_id: &DatasetId, hash: Digest) -> Result<Vec<Snapshot>, Self::Error> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|s| &s.dataset_id == dataset_id && s.geometry_hash == hash)
            .cloned()
            .collect())
    }

    async fn find_by_composite_hash(&self, dataset_id: &DatasetId, hash: Digest) -> Result<Vec<Snapshot>, Self::Error> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|s| &s.dataset_id == dataset_id && s.composite_hash == hash)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        Ok(self.rows.read().get(id).cloned())
    }

    async fn count(&self, dataset_id: &DatasetId) -> Result<u64, Self::Error> {
        Ok(self.rows.read().values().filter(|s| &s.dataset_id == dataset_id).count() as u64)
    }

    async fn delete_all(&self, dataset_id: &DatasetId) -> Result<(), Self::Error> {
        self.rows.write().retain(|_, s| &s.dataset_id != dataset_id);
        Ok(())
    }
}

/// In-memory diff store.
#[derive(Default)]
pub struct InMemoryDiffStore {
    rows: RwLock<BTreeMap<DiffId, Diff>>,
}

impl InMemoryDiffStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiffStore for InMemoryDiffStore {
    type Error = InMemoryStoreError;

    async fn insert(&self, diff: Diff) -> Result<Diff, Self::Error> {
        self.rows.write().insert(diff.id, diff.clone());
        Ok(diff)
    }

    async fn list(&self, filter: DiffFilter) -> Result<Vec<Diff>, Self::Error> {
        let rows = self.rows.read();
        let mut matched: Vec<Diff> = rows
            .values()
            .filter(|d| filter.dataset_id.map_or(true, |id| d.dataset_id == id))
            .filter(|d| filter.review_status.map_or(true, |s| d.review_status == s))
            .filter(|d| filter.diff_type.map_or(true, |t| d.diff_type == t))
            .cloned()
            .collect();
        matched.sort_by_key(|d| d.id);
        let skipped = matched.into_iter().skip(filter.offset);
        if filter.limit == 0 {
            Ok(skipped.collect())
        } else {
            Ok(skipped.take(filter.limit).collect())
        }
    }

    async fn get(&self, id: &DiffId) -> Result<Option<Diff>, Self::Error> {
        Ok(self.rows.read().get(id).cloned())
    }

    async fn update_review(&self, id: &DiffId, status: ReviewStatus, reviewer: String) -> Result<Diff, Self::Error> {
        let mut rows = self.rows.write();
        let diff = rows.get_mut(id).ok_or(InMemoryStoreError::DiffUnavailable(*id))?;
        diff.review(status, reviewer).map_err(|_| InMemoryStoreError::DiffUnavailable(*id))?;
        Ok(diff.clone())
    }

    async fn count_pending(&self, dataset_id: &DatasetId) -> Result<u64, Self::Error> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|d| &d.dataset_id == dataset_id && d.review_status == ReviewStatus::Pending)
            .count() as u64)
    }

    async fn exists_pending_for_geometry(&self, dataset_id: &DatasetId, geometry_hash: Digest) -> Result<bool, Self::Error> {
        Ok(self
            .rows
            .read()
            .values()
            .any(|d| &d.dataset_id == dataset_id && d.review_status == ReviewStatus::Pending && d.geometry_hash == geometry_hash))
    }

    async fn delete_by_dataset(&self, dataset_id: &DatasetId) -> Result<(), Self::Error> {
        self.rows.write().retain(|_, d| &d.dataset_id != dataset_id);
        Ok(())
    }
}

/// In-memory finding store.
#[derive(Default)]
pub struct InMemoryFindingStore {
    rows: RwLock<Vec<Finding>>,
}

impl InMemoryFindingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FindingStore for InMemoryFindingStore {
    type Error = InMemoryStoreError;

    async fn insert_many(&self, findings: Vec<Finding>) -> Result<(), Self::Error> {
        self.rows.write().extend(findings);
        Ok(())
    }

    async fn delete_by_dataset(&self, dataset_id: &DatasetId) -> Result<(), Self::Error> {
        self.rows.write().retain(|f| &f.dataset_id != dataset_id);
        Ok(())
    }

    async fn summarise(&self, dataset_id: &DatasetId) -> Result<FindingSummary, Self::Error> {
        let mut summary = FindingSummary::new();
        for f in self.rows.read().iter().filter(|f| &f.dataset_id == dataset_id) {
            *summary.entry((f.category, f.result)).or_insert(0) += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn dataset() -> Dataset {
        Dataset::register(
            "parcels".to_string(),
            crate::types::ConnectionDescriptor {
                host: "localhost".to_string(),
                port: 5432,
                database: "gis".to_string(),
                schema: "public".to_string(),
                table: "parcels".to_string(),
                geometry_column: "geom".to_string(),
                encrypt: crate::types::EncryptPreference::Prefer,
            },
            60,
        )
    }

    #[tokio::test]
    async fn dataset_store_round_trips() {
        let store = InMemoryDatasetStore::new();
        let ds = dataset();
        let id = ds.id;
        store.create(ds).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(store.list_active().await.unwrap().len(), 1);
        store.deactivate(&id).await.unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 0);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_store_indexes_by_hash() {
        let store = InMemorySnapshotStore::new();
        let dataset_id = DatasetId::generate();
        let g = crate::hash::hash_geometry(b"wkb");
        let a = crate::hash::hash_attributes(std::iter::empty());
        let snap = Snapshot::new(dataset_id, None, g, a, b"wkb".to_vec(), Map::new());
        store.insert(snap.clone()).await.unwrap();
        assert_eq!(store.count(&dataset_id).await.unwrap(), 1);
        assert_eq!(store.find_by_geometry_hash(&dataset_id, g).await.unwrap().len(), 1);
        assert_eq!(store.find_by_composite_hash(&dataset_id, snap.composite_hash).await.unwrap().len(), 1);
        store.delete_all(&dataset_id).await.unwrap();
        assert_eq!(store.count(&dataset_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn diff_store_one_shot_review() {
        let store = InMemoryDiffStore::new();
        let dataset_id = DatasetId::generate();
        let geometry_hash = crate::hash::hash_geometry(b"wkb");
        let diff = Diff::new_feature(dataset_id, SnapshotId::generate(), geometry_hash, 0.9);
        let id = diff.id;
        store.insert(diff).await.unwrap();
        assert!(store.exists_pending_for_geometry(&dataset_id, geometry_hash).await.unwrap());
        assert_eq!(store.count_pending(&dataset_id).await.unwrap(), 1);
        store.update_review(&id, ReviewStatus::Accepted, "alice".to_string()).await.unwrap();
        assert_eq!(store.count_pending(&dataset_id).await.unwrap(), 0);
        assert!(!store.exists_pending_for_geometry(&dataset_id, geometry_hash).await.unwrap());
        let err = store.update_review(&id, ReviewStatus::Rejected, "bob".to_string()).await;
        assert!(err.is_err());
        store.delete_by_dataset(&dataset_id).await.unwrap();
        assert_eq!(store.count_pending(&dataset_id).await.unwrap(), 0);
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finding_store_replaces_on_delete_then_insert() {
        let store = InMemoryFindingStore::new();
        let dataset_id = DatasetId::generate();
        let snap_id = SnapshotId::generate();
        let f = Finding::new(dataset_id, snap_id, crate::types::CheckCategory::Validity, crate::types::CheckResult::Fail, "bad");
        store.insert_many(vec![f]).await.unwrap();
        let summary = store.summarise(&dataset_id).await.unwrap();
        assert_eq!(summary.len(), 1);
        store.delete_by_dataset(&dataset_id).await.unwrap();
        let summary = store.summarise(&dataset_id).await.unwrap();
        assert!(summary.is_empty());
    }
}
