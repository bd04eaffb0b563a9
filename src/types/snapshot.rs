//! Immutable feature-version snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::Digest;

use super::ids::{DatasetId, SnapshotId};

/// A scalar attribute value as read from the remote source. Non-scalar
/// values are stringified by the reader before reaching this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Stringify for hashing purposes. `Null` renders as the literal
    /// string `"None"` so an attribute that was dropped entirely hashes
    /// differently from one explicitly set to an empty string.
    pub fn to_hash_string(&self) -> String {
        match self {
            AttributeValue::Null => "None".to_string(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Integer(i) => i.to_string(),
            AttributeValue::Float(f) => f.to_string(),
            AttributeValue::Text(s) => s.clone(),
        }
    }
}

/// One immutable version of one feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub dataset_id: DatasetId,
    /// Opaque identifier extracted from the source's `id`/`gid` column, if
    /// any. Never required for classification.
    pub source_row_id: Option<String>,
    pub geometry_hash: Digest,
    pub attributes_hash: Digest,
    pub composite_hash: Digest,
    /// Canonical well-known binary encoding of the geometry, in the SRID
    /// the dataset was registered with.
    pub geometry_wkb: Vec<u8>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot, deriving the composite hash from the two parts so
    /// callers cannot construct an inconsistent one.
    pub fn new(
        dataset_id: DatasetId,
        source_row_id: Option<String>,
        geometry_hash: Digest,
        attributes_hash: Digest,
        geometry_wkb: Vec<u8>,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> Self {
        Snapshot {
            id: SnapshotId::generate(),
            dataset_id,
            source_row_id,
            geometry_hash,
            attributes_hash,
            composite_hash: crate::hash::hash_composite(geometry_hash, attributes_hash),
            geometry_wkb,
            attributes,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_hash_is_consistent_with_parts() {
        let g = crate::hash::hash_geometry(b"wkb");
        let a = crate::hash::hash_attributes(std::iter::empty());
        let snap = Snapshot::new(DatasetId::generate(), None, g, a, b"wkb".to_vec(), BTreeMap::new());
        assert_eq!(snap.composite_hash, crate::hash::hash_composite(g, a));
    }
}
