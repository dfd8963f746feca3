//! Error types for evidence snapshots

use crate::hash::HashError;
use std::path::PathBuf;

/// Errors raised while building, persisting or loading snapshots
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A mutation was attempted on a sealed snapshot
    #[error("snapshot {snapshot_id} is immutable: {operation} is not permitted")]
    Immutable {
        /// Snapshot that was targeted
        snapshot_id: String,
        /// Rejected operation name
        operation: &'static str,
    },

    /// Stored hash does not match the recomputed hash
    #[error("Snapshot integrity violation: hash mismatch (expected {expected}, computed {actual})")]
    IntegrityViolation {
        /// Hash recorded in the snapshot
        expected: String,
        /// Hash recomputed from content
        actual: String,
    },

    /// Persisted snapshot lost its immutability flag
    #[error("snapshot {0} is not marked immutable")]
    NotSealed(String),

    /// Evidence file matched no classification rule under a reject policy
    #[error("evidence file {0} matches no control")]
    Unclassified(PathBuf),

    /// Snapshot id is not a plain file name
    #[error("invalid snapshot id: {0:?}")]
    InvalidId(String),

    /// Filesystem failure
    #[error("io error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Hashing failure
    #[error("hash error: {0}")]
    Hash(#[from] HashError),
}

impl SnapshotError {
    /// IO error at `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error indicates tampering rather than a transient fault
    #[inline]
    #[must_use]
    pub fn is_tampering(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. } | Self::NotSealed(_))
    }
}
