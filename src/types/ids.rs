//! Newtype identifiers for every persisted entity.
//!
//! Each wraps a [`uuid::Uuid`] and follows the same contract: `new`,
//! `from_str` via [`std::str::FromStr`], `Display`, and an `Ord` derived
//! solely from the wrapped UUID so stores can keep entities in
//! deterministic iteration order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub fn new(id: Uuid) -> Self {
                $name(id)
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                $name(Uuid::new_v4())
            }

            /// Borrow the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                $name(id)
            }
        }
    };
}

id_newtype!(DatasetId, "Identifies a registered dataset.");
id_newtype!(SnapshotId, "Identifies one immutable feature-version snapshot.");
id_newtype!(DiffId, "Identifies one classified change awaiting or past review.");
id_newtype!(FindingId, "Identifies one quality-check outcome for a snapshot.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = DatasetId::generate();
        let s = id.to_string();
        let parsed: DatasetId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_id_types_do_not_collide_at_the_type_level() {
        let d = DatasetId::generate();
        let uuid = *d.as_uuid();
        let s = SnapshotId::new(uuid);
        // Same underlying UUID, different newtypes; just confirm construction works.
        assert_eq!(s.as_uuid(), &uuid);
    }
}
