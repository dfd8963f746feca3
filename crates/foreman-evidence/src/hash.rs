//! SHA-256 digests for evidence files and snapshots
//!
//! Every integrity check in the gate compares [`ContentHash`] values. On the
//! wire they are 64 lowercase hex characters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

const DIGEST_LEN: usize = 32;

/// SHA-256 digest of evidence content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; DIGEST_LEN]);

impl ContentHash {
    /// Digest of raw file bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Digest of `value` rendered as canonical JSON
    ///
    /// Lowering through [`serde_json::Value`] sorts object keys, so two
    /// documents with the same fields hash equal whatever their declaration
    /// order.
    ///
    /// # Errors
    /// [`HashError::Encode`] if `value` cannot be serialized
    pub fn compute_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Self, HashError> {
        let lowered = serde_json::to_value(value)?;
        Ok(Self::compute(serde_json::to_string(&lowered)?.as_bytes()))
    }

    /// Raw digest
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Eight hex characters for log lines and report tables
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(HashError::Length(s.len()));
        }
        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut digest)?;
        Ok(Self(digest))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Cow::<'de, str>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Failure to parse or produce a [`ContentHash`]
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Not 64 hex characters
    #[error("expected 64 hex characters, found {0}")]
    Length(usize),

    /// Non-hex character
    #[error("malformed hex digest: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Value could not be rendered as JSON
    #[error("cannot encode value for hashing: {0}")]
    Encode(#[from] serde_json::Error),
}
