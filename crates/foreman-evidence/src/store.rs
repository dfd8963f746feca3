//! On-disk snapshot persistence with integrity re-validation on load

use crate::error::SnapshotError;
use crate::hash::ContentHash;
use crate::snapshot::EvidenceSnapshot;
use std::path::{Path, PathBuf};

/// Integrity status of one evidence file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIntegrity {
    /// Evidence file path
    pub path: String,
    /// Hash recorded in the snapshot
    pub expected: ContentHash,
    /// True when the file exists and still hashes to `expected`
    pub intact: bool,
}

/// Directory-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a snapshot id is stored at
    ///
    /// # Errors
    /// [`SnapshotError::InvalidId`] for ids that would leave the store directory
    pub fn path_for(&self, snapshot_id: &str) -> Result<PathBuf, SnapshotError> {
        if snapshot_id.is_empty() || snapshot_id.contains(['/', '\\']) || snapshot_id.contains("..") {
            return Err(SnapshotError::InvalidId(snapshot_id.to_string()));
        }
        Ok(self.dir.join(format!("{snapshot_id}.json")))
    }

    /// Persist atomically (temp file then rename)
    ///
    /// # Errors
    /// Refuses a snapshot that does not verify; filesystem errors
    pub async fn save(&self, snapshot: &EvidenceSnapshot) -> Result<PathBuf, SnapshotError> {
        snapshot.verify()?;
        let path = self.path_for(snapshot.snapshot_id())?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SnapshotError::io(&self.dir, e))?;

        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| SnapshotError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SnapshotError::io(&path, e))?;

        tracing::info!(snapshot_id = snapshot.snapshot_id(), path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Load by id
    ///
    /// # Errors
    /// See [`SnapshotStore::load_path`]
    pub async fn load(&self, snapshot_id: &str) -> Result<EvidenceSnapshot, SnapshotError> {
        self.load_path(&self.path_for(snapshot_id)?).await
    }

    /// Load from an explicit path and recompute its hash
    ///
    /// # Errors
    /// [`SnapshotError::IntegrityViolation`] if the content was altered;
    /// filesystem or decode errors
    pub async fn load_path(&self, path: &Path) -> Result<EvidenceSnapshot, SnapshotError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SnapshotError::io(path, e))?;
        let snapshot: EvidenceSnapshot = serde_json::from_slice(&bytes)?;

        if let Err(e) = snapshot.verify() {
            tracing::error!(
                snapshot_id = snapshot.snapshot_id(),
                path = %path.display(),
                error = %e,
                "snapshot tampering detected"
            );
            return Err(e);
        }
        Ok(snapshot)
    }
}

/// Re-hash one file and compare; unreadable files count as not intact
pub async fn verify_evidence_file(path: &Path, expected: &ContentHash) -> bool {
    match tokio::fs::read(path).await {
        Ok(content) => ContentHash::compute(&content) == *expected,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "evidence file unreadable");
            false
        }
    }
}

/// Check every file recorded in the snapshot against its current content
pub async fn verify_snapshot_files(snapshot: &EvidenceSnapshot) -> Vec<FileIntegrity> {
    let mut results = Vec::new();
    for file in snapshot.files() {
        let intact = verify_evidence_file(Path::new(&file.path), &file.hash).await;
        results.push(FileIntegrity {
            path: file.path.clone(),
            expected: file.hash,
            intact,
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SnapshotBuilder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let evidence = tmp.path().join("evidence");
        tokio::fs::create_dir_all(&evidence).await.unwrap();
        tokio::fs::write(evidence.join("qa.log"), b"303/303").await.unwrap();

        let snapshot = SnapshotBuilder::new().build(5, "0123456789", &evidence).await.unwrap();
        let store = SnapshotStore::new(tmp.path().join("snapshots"));
        store.save(&snapshot).await.unwrap();

        let loaded = store.load(snapshot.snapshot_id()).await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn edited_file_is_tampering() {
        let tmp = TempDir::new().unwrap();
        let snapshot = SnapshotBuilder::new().build(5, "0123456789", &tmp.path().join("none")).await.unwrap();
        let store = SnapshotStore::new(tmp.path());
        let path = store.save(&snapshot).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let edited = text.replace("\"prNumber\": 5", "\"prNumber\": 6");
        assert_ne!(text, edited);
        tokio::fs::write(&path, edited).await.unwrap();

        let err = store.load_path(&path).await.unwrap_err();
        assert!(err.is_tampering());
        assert!(err.to_string().starts_with("Snapshot integrity violation"));
    }

    #[tokio::test]
    async fn traversal_ids_are_refused() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("snapshots"));
        for id in ["../outside", "a/b", "a\\b", "..", ""] {
            assert!(matches!(store.path_for(id), Err(SnapshotError::InvalidId(_))), "{id:?} accepted");
        }
        let err = store.load("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidId(_)));
        assert_eq!(store.path_for("snap-1").unwrap(), tmp.path().join("snapshots").join("snap-1.json"));
    }

    #[tokio::test]
    async fn file_integrity_detects_changes() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("qa.log"), b"green").await.unwrap();
        tokio::fs::write(tmp.path().join("cs1.md"), b"intact").await.unwrap();
        let snapshot = SnapshotBuilder::new().build(1, "abc", tmp.path()).await.unwrap();

        tokio::fs::write(tmp.path().join("qa.log"), b"red").await.unwrap();

        let results = verify_snapshot_files(&snapshot).await;
        assert_eq!(results.len(), 2);
        let changed: Vec<_> = results.iter().filter(|r| !r.intact).collect();
        assert_eq!(changed.len(), 1);
        assert!(changed[0].path.ends_with("qa.log"));
    }

    #[tokio::test]
    async fn missing_file_not_intact() {
        let hash = ContentHash::compute(b"x");
        assert!(!verify_evidence_file(Path::new("/nonexistent/evidence.log"), &hash).await);
    }
}
