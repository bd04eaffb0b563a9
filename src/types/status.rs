//! Process-local, non-persistent quality-check run status.
//!
//! See `scheduler::status` for the guarded map this type lives inside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::finding::FindingSummary;

/// Run state for a dataset's in-flight or recently-finished quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// Progress within a running quality check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub phase: String,
}

impl Progress {
    pub fn new(phase: impl Into<String>) -> Self {
        Progress { current: 0, total: 0, phase: phase.into() }
    }
}

/// One dataset's quality-check status entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheckStatus {
    pub dataset_name: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    pub error: Option<String>,
    pub summary: Option<FindingSummary>,
}

impl QualityCheckStatus {
    /// A freshly started run, state `Running`, zeroed progress.
    pub fn started(dataset_name: String) -> Self {
        QualityCheckStatus {
            dataset_name,
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            progress: Progress::new("initializing"),
            error: None,
            summary: None,
        }
    }

    pub fn mark_completed(&mut self, summary: FindingSummary) {
        self.state = RunState::Completed;
        self.completed_at = Some(Utc::now());
        self.summary = Some(summary);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Whether this entry is eligible for garbage collection at the given
    /// instant, given a TTL applied from `completed_at`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        match self.completed_at {
            Some(completed) => now >= completed + ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_status_has_no_completed_at() {
        let s = QualityCheckStatus::started("parcels".to_string());
        assert_eq!(s.state, RunState::Running);
        assert!(s.completed_at.is_none());
        assert!(!s.is_expired(Utc::now() + chrono::Duration::days(1), chrono::Duration::seconds(1)));
    }

    #[test]
    fn completed_status_expires_after_ttl() {
        let mut s = QualityCheckStatus::started("parcels".to_string());
        s.mark_completed(FindingSummary::new());
        let completed_at = s.completed_at.unwrap();
        assert!(!s.is_expired(completed_at, chrono::Duration::seconds(300)));
        assert!(s.is_expired(completed_at + chrono::Duration::seconds(301), chrono::Duration::seconds(300)));
    }
}
