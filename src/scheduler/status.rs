//! Process-local quality-check status tracking.
//!
//! A guarded map so status can be shared behind `Arc` across the scheduler
//! loop and the control API's poll endpoint.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::types::{DatasetId, FindingSummary, QualityCheckStatus};

/// Guarded table of in-flight and recently-finished quality-check runs,
/// one entry per dataset.
#[derive(Default)]
pub struct QualityCheckStatusMap {
    entries: RwLock<HashMap<DatasetId, QualityCheckStatus>>,
}

impl QualityCheckStatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, dataset_id: DatasetId, dataset_name: String) {
        self.entries.write().insert(dataset_id, QualityCheckStatus::started(dataset_name));
    }

    /// Update the in-flight progress of a running check. A no-op if the
    /// entry has already completed or failed, or was never started (e.g.
    /// the entry expired and was swept mid-run).
    pub fn update_progress(&self, dataset_id: DatasetId, current: usize, total: usize, phase: &str) {
        if let Some(entry) = self.entries.write().get_mut(&dataset_id) {
            if entry.state == crate::types::RunState::Running {
                entry.progress.current = current;
                entry.progress.total = total;
                entry.progress.phase = phase.to_string();
            }
        }
    }

    pub fn complete(&self, dataset_id: DatasetId, summary: FindingSummary) {
        if let Some(entry) = self.entries.write().get_mut(&dataset_id) {
            entry.mark_completed(summary);
        }
    }

    pub fn fail(&self, dataset_id: DatasetId, error: String) {
        if let Some(entry) = self.entries.write().get_mut(&dataset_id) {
            entry.mark_failed(error);
        }
    }

    pub fn get(&self, dataset_id: &DatasetId) -> Option<QualityCheckStatus> {
        self.entries.read().get(dataset_id).cloned()
    }

    /// Remove entries whose completion is older than `ttl`, as of `now`.
    pub fn sweep(&self, now: DateTime<Utc>, ttl: chrono::Duration) {
        self.entries.write().retain(|_, status| !status.is_expired(now, ttl));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_complete_round_trips() {
        let map = QualityCheckStatusMap::new();
        let id = DatasetId::generate();
        map.start(id, "parcels".to_string());
        assert_eq!(map.get(&id).unwrap().state, crate::types::RunState::Running);
        map.complete(id, FindingSummary::new());
        assert_eq!(map.get(&id).unwrap().state, crate::types::RunState::Completed);
    }

    #[test]
    fn sweep_removes_expired_entries_only() {
        let map = QualityCheckStatusMap::new();
        let id = DatasetId::generate();
        map.start(id, "parcels".to_string());
        map.complete(id, FindingSummary::new());
        let completed_at = map.get(&id).unwrap().completed_at.unwrap();
        map.sweep(completed_at + chrono::Duration::seconds(1), chrono::Duration::seconds(300));
        assert!(map.get(&id).is_some());
        map.sweep(completed_at + chrono::Duration::seconds(301), chrono::Duration::seconds(300));
        assert!(map.get(&id).is_none());
    }

    #[test]
    fn update_progress_is_visible_to_a_concurrent_poll() {
        let map = QualityCheckStatusMap::new();
        let id = DatasetId::generate();
        map.start(id, "parcels".to_string());
        map.update_progress(id, 3, 10, "testing features");
        let status = map.get(&id).unwrap();
        assert_eq!(status.progress.current, 3);
        assert_eq!(status.progress.total, 10);
        assert_eq!(status.progress.phase, "testing features");
    }

    #[test]
    fn update_progress_after_completion_is_ignored() {
        let map = QualityCheckStatusMap::new();
        let id = DatasetId::generate();
        map.start(id, "parcels".to_string());
        map.complete(id, FindingSummary::new());
        map.update_progress(id, 3, 10, "testing features");
        assert_eq!(map.get(&id).unwrap().progress.current, 0);
    }

    #[test]
    fn failed_run_is_recorded_with_its_error() {
        let map = QualityCheckStatusMap::new();
        let id = DatasetId::generate();
        map.start(id, "parcels".to_string());
        map.fail(id, "connection refused".to_string());
        let status = map.get(&id).unwrap();
        assert_eq!(status.state, crate::types::RunState::Failed);
        assert_eq!(status.error.as_deref(), Some("connection refused"));
    }
}
