//! # geowatch-core
//!
//! Change detection and spatial quality assurance for externally-managed
//! PostGIS tables.
//!
//! geowatch answers one question:
//!
//! > Since the last time we looked at this table, what changed, and is any
//! > of it geometrically suspect?
//!
//! ## Core Contract
//!
//! 1. Read a dataset's external table without ever writing to it.
//! 2. Classify every feature as NEW, UPDATED, or DELETED against the last
//!    recorded snapshot, using content hashes rather than row identity.
//! 3. Run a spatial quality engine over current features and record
//!    findings per category.
//!
//! ## Architecture
//!
//! ```text
//! ExternalSourceReader → ChangeDetector → SnapshotStore / DiffStore
//!                              ↓
//!                        QualityRunner → FindingStore
//!                              ↑
//!                          Scheduler (per-dataset cadence)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same table contents + same snapshot history → identical classification
//! - Hashing is over raw geometry/attribute bytes, never row identity
//! - A diff transitions out of PENDING exactly once

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod detector;
pub mod hash;
pub mod lifecycle;
pub mod quality;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use config::{AppConfig, QualityThresholds};
pub use detector::{ChangeDetector, DetectorError, DetectionReport};
pub use hash::{hash_attributes, hash_composite, hash_geometry, Digest};
pub use lifecycle::{LifecycleError, LifecycleManager, RestartReport};
pub use quality::{CategoryTester, QualityRunError, QualityRunner};
pub use scheduler::{DispatchError, QualityCheckStatusMap, Scheduler};
pub use source::{ExternalSourceReader, FeatureRow, SourceError, SourceReader};
pub use store::{DatasetStore, DiffFilter, DiffStore, FindingStore, SnapshotStore};
pub use types::{
    AttributeValue, CheckCategory, CheckResult, ConnectionDescriptor, ConnectionStatus, Dataset,
    DatasetId, Diff, DiffId, DiffType, EncryptPreference, Finding, FindingId, FindingSummary,
    Progress, QualityCheckStatus, ReviewError, ReviewStatus, RunState, Snapshot, SnapshotId,
};

#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresStore, PostgresStoreError};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all geowatch types. Increment on breaking changes to
/// any persisted schema type.
pub const GEOWATCH_SCHEMA_VERSION: &str = "1.0.0";
