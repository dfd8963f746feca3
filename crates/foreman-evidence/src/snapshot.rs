//! Immutable evidence snapshot
//!
//! A snapshot records every evidence file collected for one PR validation
//! pass, bucketed by control, together with a SHA-256 over the canonical
//! JSON of all fields except the hash itself.
//!
//! Fields are private. A snapshot is produced only by
//! [`SnapshotBuilder`](crate::SnapshotBuilder) or by loading a persisted
//! file through [`SnapshotStore`](crate::SnapshotStore), and every mutation
//! entry point returns [`SnapshotError::Immutable`].

use crate::control::ControlName;
use crate::error::SnapshotError;
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Evidence file category, derived from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    /// `.log`
    Log,
    /// `.json`
    Result,
    /// `.md`
    Report,
    /// Anything else
    Document,
}

impl EvidenceKind {
    /// Classify by file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("log") => Self::Log,
            Some("json") => Self::Result,
            Some("md") => Self::Report,
            _ => Self::Document,
        }
    }
}

/// One collected evidence file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFile {
    /// Path as collected (evidence dir joined with the relative name)
    pub path: String,
    /// SHA-256 of the file content
    pub hash: ContentHash,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub timestamp: DateTime<Utc>,
    /// Category
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
}

/// Bucket metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketMetadata {
    /// When collection ran
    pub collection_time: DateTime<Utc>,
    /// Number of files in the bucket
    pub file_count: usize,
    /// Free-form note, e.g. for dry runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Evidence collected for one control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBucket {
    /// Files in collection order
    pub files: Vec<EvidenceFile>,
    /// Path to hash index
    pub hashes: BTreeMap<String, ContentHash>,
    /// Bucket metadata
    pub metadata: BucketMetadata,
}

impl EvidenceBucket {
    pub(crate) fn empty(collection_time: DateTime<Utc>) -> Self {
        Self {
            files: Vec::new(),
            hashes: BTreeMap::new(),
            metadata: BucketMetadata {
                collection_time,
                file_count: 0,
                note: None,
            },
        }
    }

    pub(crate) fn push(&mut self, file: EvidenceFile) {
        self.hashes.insert(file.path.clone(), file.hash);
        self.files.push(file);
        self.metadata.file_count = self.files.len();
    }
}

/// Result of a completeness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completeness {
    /// True when all nine controls have a bucket
    pub complete: bool,
    /// Controls without a bucket, in execution order
    pub missing_controls: Vec<ControlName>,
}

/// Sealed, content-hashed evidence snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSnapshot {
    snapshot_id: String,
    timestamp: DateTime<Utc>,
    pr_number: u64,
    commit_sha: String,
    evidence: BTreeMap<ControlName, EvidenceBucket>,
    immutable: bool,
    hash: ContentHash,
}

/// Every field except `hash`, borrowed for hashing
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    snapshot_id: &'a str,
    timestamp: &'a DateTime<Utc>,
    pr_number: u64,
    commit_sha: &'a str,
    evidence: &'a BTreeMap<ControlName, EvidenceBucket>,
    immutable: bool,
}

impl EvidenceSnapshot {
    /// Seal collected evidence into a snapshot
    pub(crate) fn seal(
        timestamp: DateTime<Utc>,
        pr_number: u64,
        commit_sha: String,
        evidence: BTreeMap<ControlName, EvidenceBucket>,
    ) -> Result<Self, SnapshotError> {
        let sha_prefix: String = commit_sha.chars().take(8).collect();
        let snapshot_id = format!("snapshot_{}_{sha_prefix}", timestamp.timestamp_millis());
        let mut snapshot = Self {
            snapshot_id,
            timestamp,
            pr_number,
            commit_sha,
            evidence,
            immutable: true,
            hash: ContentHash::default(),
        };
        snapshot.hash = snapshot.compute_hash()?;
        Ok(snapshot)
    }

    /// Recompute the whole-snapshot hash
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn compute_hash(&self) -> Result<ContentHash, SnapshotError> {
        let fields = HashedFields {
            snapshot_id: &self.snapshot_id,
            timestamp: &self.timestamp,
            pr_number: self.pr_number,
            commit_sha: &self.commit_sha,
            evidence: &self.evidence,
            immutable: self.immutable,
        };
        Ok(ContentHash::compute_canonical(&fields)?)
    }

    /// Check that the stored hash matches the content
    ///
    /// # Errors
    /// [`SnapshotError::IntegrityViolation`] on mismatch,
    /// [`SnapshotError::NotSealed`] if the immutability flag was cleared
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if !self.immutable {
            return Err(SnapshotError::NotSealed(self.snapshot_id.clone()));
        }
        let actual = self.compute_hash()?;
        if actual != self.hash {
            return Err(SnapshotError::IntegrityViolation {
                expected: self.hash.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Which of the nine controls have buckets
    #[must_use]
    pub fn completeness(&self) -> Completeness {
        let missing_controls: Vec<ControlName> = ControlName::ALL
            .into_iter()
            .filter(|c| !self.evidence.contains_key(c))
            .collect();
        Completeness {
            complete: missing_controls.is_empty(),
            missing_controls,
        }
    }

    /// Always fails: snapshots cannot be edited
    ///
    /// # Errors
    /// Always returns [`SnapshotError::Immutable`]
    pub fn modify(&self, _changes: serde_json::Value) -> Result<(), SnapshotError> {
        Err(self.immutable_error("modify"))
    }

    /// Always fails: evidence cannot be added after sealing
    ///
    /// # Errors
    /// Always returns [`SnapshotError::Immutable`]
    pub fn add_evidence(&self, _control: ControlName, _file: EvidenceFile) -> Result<(), SnapshotError> {
        Err(self.immutable_error("add_evidence"))
    }

    /// Always fails: evidence cannot be removed after sealing
    ///
    /// # Errors
    /// Always returns [`SnapshotError::Immutable`]
    pub fn remove_evidence(&self, _control: ControlName) -> Result<(), SnapshotError> {
        Err(self.immutable_error("remove_evidence"))
    }

    fn immutable_error(&self, operation: &'static str) -> SnapshotError {
        tracing::warn!(snapshot_id = %self.snapshot_id, operation, "rejected snapshot mutation");
        SnapshotError::Immutable {
            snapshot_id: self.snapshot_id.clone(),
            operation,
        }
    }

    /// Snapshot id
    #[inline]
    #[must_use]
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// PR number
    #[inline]
    #[must_use]
    pub fn pr_number(&self) -> u64 {
        self.pr_number
    }

    /// Commit SHA
    #[inline]
    #[must_use]
    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    /// Evidence bucket for one control
    #[inline]
    #[must_use]
    pub fn bucket(&self, control: ControlName) -> Option<&EvidenceBucket> {
        self.evidence.get(&control)
    }

    /// All buckets in execution order
    #[inline]
    #[must_use]
    pub fn evidence(&self) -> &BTreeMap<ControlName, EvidenceBucket> {
        &self.evidence
    }

    /// Every file across buckets
    pub fn files(&self) -> impl Iterator<Item = &EvidenceFile> {
        self.evidence.values().flat_map(|b| b.files.iter())
    }

    /// Always true for a sealed snapshot
    #[inline]
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Stored hash
    #[inline]
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.hash
    }
}
