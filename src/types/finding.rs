//! Quality-check outcomes produced by the spatial test engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{DatasetId, FindingId, SnapshotId};

/// The category of geometric test that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckCategory {
    Validity,
    Topology,
    Area,
    Duplicate,
    Polygon,
    Linestring,
    Point,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckCategory::Validity => "VALIDITY",
            CheckCategory::Topology => "TOPOLOGY",
            CheckCategory::Area => "AREA",
            CheckCategory::Duplicate => "DUPLICATE",
            CheckCategory::Polygon => "POLYGON",
            CheckCategory::Linestring => "LINESTRING",
            CheckCategory::Point => "POINT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CheckCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALIDITY" => Ok(CheckCategory::Validity),
            "TOPOLOGY" => Ok(CheckCategory::Topology),
            "AREA" => Ok(CheckCategory::Area),
            "DUPLICATE" => Ok(CheckCategory::Duplicate),
            "POLYGON" => Ok(CheckCategory::Polygon),
            "LINESTRING" => Ok(CheckCategory::Linestring),
            "POINT" => Ok(CheckCategory::Point),
            other => Err(format!("unknown check category: {other}")),
        }
    }
}

/// The outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckResult {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckResult::Pass => "PASS",
            CheckResult::Warning => "WARNING",
            CheckResult::Fail => "FAIL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CheckResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(CheckResult::Pass),
            "WARNING" => Ok(CheckResult::Warning),
            "FAIL" => Ok(CheckResult::Fail),
            other => Err(format!("unknown check result: {other}")),
        }
    }
}

/// One quality-check outcome for one snapshot under one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub dataset_id: DatasetId,
    pub snapshot_id: SnapshotId,
    pub category: CheckCategory,
    pub result: CheckResult,
    pub message: String,
    pub detail: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        dataset_id: DatasetId,
        snapshot_id: SnapshotId,
        category: CheckCategory,
        result: CheckResult,
        message: impl Into<String>,
    ) -> Self {
        Finding {
            id: FindingId::generate(),
            dataset_id,
            snapshot_id,
            category,
            result,
            message: message.into(),
            detail: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach structured detail, builder-style.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.detail.insert(key.into(), value);
        self
    }
}

/// Summary counts keyed by `(category, result)`, as returned by a
/// quality-check run.
pub type FindingSummary = BTreeMap<(CheckCategory, CheckResult), u64>;
