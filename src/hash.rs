//! Content-addressed digests for geometries, attribute sets, and composite
//! feature versions.
//!
//! All three functions defer to a single 128-bit non-cryptographic hash
//! (XXH3-128) so that every producer and consumer in a deployment agrees on
//! the same digest for the same bytes. The digest is not required to resist
//! deliberate forgery, only accidental collision at dataset sizes up to
//! 10^8 features.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

/// A 128-bit content digest, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 16]);

impl Digest {
    /// Digest of the empty byte string.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Digest(xxh3_128(bytes).to_be_bytes())
    }

    /// Raw bytes of this digest.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Error parsing a [`Digest`] from a string.
#[derive(Debug, thiserror::Error)]
pub enum DigestParseError {
    /// The input was not valid hex.
    #[error("invalid hex in digest: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The decoded bytes were not exactly 16 bytes long.
    #[error("digest must decode to 16 bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestParseError::WrongLength(bytes.len()))?;
        Ok(Digest(arr))
    }
}

/// Digest of a geometry's canonical well-known binary encoding.
pub fn hash_geometry(wkb: &[u8]) -> Digest {
    Digest::of_bytes(wkb)
}

/// Digest of a feature's non-geometric attribute set.
///
/// Pairs are sorted by key and joined as `k1:v1|k2:v2|...`; an empty
/// mapping yields the digest of the empty string.
pub fn hash_attributes<'a, I>(attrs: I) -> Digest
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut pairs: Vec<(&'a str, String)> = attrs.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join("|");
    Digest::of_bytes(joined.as_bytes())
}

/// Digest combining a geometry digest and an attributes digest into one
/// feature-version identity.
pub fn hash_composite(geometry_hash: Digest, attributes_hash: Digest) -> Digest {
    let s = format!("geom:{geometry_hash}|attrs:{attributes_hash}");
    Digest::of_bytes(s.as_bytes())
}
