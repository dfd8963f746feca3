//! Snapshot construction from an evidence directory

use crate::classify::{Classification, EvidenceClassifier};
use crate::control::ControlName;
use crate::error::SnapshotError;
use crate::hash::ContentHash;
use crate::snapshot::{EvidenceBucket, EvidenceFile, EvidenceKind, EvidenceSnapshot};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Note recorded on every bucket when the evidence directory is absent
pub const DRY_RUN_NOTE: &str = "No evidence directory found (dry run mode)";

/// Builds sealed snapshots by walking an evidence directory
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    classifier: EvidenceClassifier,
}

impl SnapshotBuilder {
    /// Builder with the default classifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom classifier
    #[inline]
    #[must_use]
    pub fn with_classifier(mut self, classifier: EvidenceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Collect, classify, hash and seal
    ///
    /// A missing `evidence_dir` is a dry run: all nine buckets are present
    /// and empty, each carrying [`DRY_RUN_NOTE`].
    ///
    /// # Errors
    /// Filesystem errors other than a missing directory, or a file rejected
    /// by the classifier's unmatched policy
    pub async fn build(
        &self,
        pr_number: u64,
        commit_sha: impl Into<String>,
        evidence_dir: &Path,
    ) -> Result<EvidenceSnapshot, SnapshotError> {
        let collection_time = Utc::now();
        let mut evidence: BTreeMap<ControlName, EvidenceBucket> = ControlName::ALL
            .into_iter()
            .map(|c| (c, EvidenceBucket::empty(collection_time)))
            .collect();

        match tokio::fs::metadata(evidence_dir).await {
            Ok(meta) if meta.is_dir() => {
                let files = collect_files(evidence_dir).await?;
                tracing::debug!(dir = %evidence_dir.display(), count = files.len(), "collected evidence files");
                for path in files {
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let control = match self.classifier.classify(&file_name) {
                        Classification::Bucket(control) => control,
                        Classification::Skip => {
                            tracing::debug!(path = %path.display(), "skipping unclassified evidence");
                            continue;
                        }
                        Classification::Reject => return Err(SnapshotError::Unclassified(path)),
                    };
                    let file = describe_file(&path).await?;
                    if let Some(bucket) = evidence.get_mut(&control) {
                        bucket.push(file);
                    }
                }
            }
            Ok(_) => {
                return Err(SnapshotError::io(
                    evidence_dir,
                    std::io::Error::new(ErrorKind::InvalidInput, "evidence path is not a directory"),
                ));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(dir = %evidence_dir.display(), "evidence directory missing, dry run snapshot");
                for bucket in evidence.values_mut() {
                    bucket.metadata.note = Some(DRY_RUN_NOTE.to_string());
                }
            }
            Err(e) => return Err(SnapshotError::io(evidence_dir, e)),
        }

        let snapshot = EvidenceSnapshot::seal(collection_time, pr_number, commit_sha.into(), evidence)?;
        tracing::info!(
            snapshot_id = snapshot.snapshot_id(),
            pr = pr_number,
            hash = %snapshot.hash(),
            "evidence snapshot sealed"
        );
        Ok(snapshot)
    }
}

/// Recursive walk; paths returned sorted so bucket order is stable
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| SnapshotError::io(&dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SnapshotError::io(&dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SnapshotError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

async fn describe_file(path: &Path) -> Result<EvidenceFile, SnapshotError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| SnapshotError::io(path, e))?;
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| SnapshotError::io(path, e))?;
    let timestamp = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(EvidenceFile {
        path: path.to_string_lossy().into_owned(),
        hash: ContentHash::compute(&content),
        size: meta.len(),
        timestamp,
        kind: EvidenceKind::from_path(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::UnmatchedEvidence;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_dir_is_dry_run() {
        let tmp = TempDir::new().unwrap();
        let snapshot = SnapshotBuilder::new()
            .build(7, "deadbeefcafe", &tmp.path().join("absent"))
            .await
            .unwrap();

        assert_eq!(snapshot.evidence().len(), 9);
        for bucket in snapshot.evidence().values() {
            assert!(bucket.files.is_empty());
            assert_eq!(bucket.metadata.note.as_deref(), Some(DRY_RUN_NOTE));
        }
        snapshot.verify().unwrap();
    }

    #[tokio::test]
    async fn nested_files_are_classified_and_hashed() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(tmp.path().join("qa-results.json"), b"{}").await.unwrap();
        tokio::fs::write(nested.join("constitutional.md"), b"# ok").await.unwrap();
        tokio::fs::write(nested.join("misc.txt"), b"other").await.unwrap();

        let snapshot = SnapshotBuilder::new().build(1, "abc", tmp.path()).await.unwrap();

        let qiel = snapshot.bucket(ControlName::Qiel).unwrap();
        assert_eq!(qiel.files.len(), 2); // qa-results + unmatched misc.txt
        assert_eq!(qiel.metadata.file_count, 2);
        let cs1 = snapshot.bucket(ControlName::Cs1).unwrap();
        assert_eq!(cs1.files[0].hash, ContentHash::compute(b"# ok"));
        assert_eq!(cs1.files[0].kind, EvidenceKind::Report);
        assert_eq!(cs1.files[0].size, 4);
    }

    #[tokio::test]
    async fn reject_policy_fails_on_unmatched() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("misc.txt"), b"x").await.unwrap();
        let builder = SnapshotBuilder::new()
            .with_classifier(EvidenceClassifier::default().with_unmatched(UnmatchedEvidence::Reject));
        let err = builder.build(1, "abc", tmp.path()).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Unclassified(_)));
    }

    #[tokio::test]
    async fn ignore_policy_drops_unmatched() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("misc.txt"), b"x").await.unwrap();
        let builder = SnapshotBuilder::new()
            .with_classifier(EvidenceClassifier::default().with_unmatched(UnmatchedEvidence::Ignore));
        let snapshot = builder.build(1, "abc", tmp.path()).await.unwrap();
        assert_eq!(snapshot.files().count(), 0);
    }
}
