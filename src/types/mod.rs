//! Domain types: identifiers and the four persisted entities plus the
//! process-local quality-check status.

pub mod dataset;
pub mod diff;
pub mod finding;
pub mod ids;
pub mod snapshot;
pub mod status;

pub use dataset::{ConnectionDescriptor, ConnectionStatus, Dataset, EncryptPreference};
pub use diff::{Diff, DiffType, ReviewError, ReviewStatus};
pub use finding::{CheckCategory, CheckResult, Finding, FindingSummary};
pub use ids::{DatasetId, DiffId, FindingId, SnapshotId};
pub use snapshot::{AttributeValue, Snapshot};
pub use status::{Progress, QualityCheckStatus, RunState};
