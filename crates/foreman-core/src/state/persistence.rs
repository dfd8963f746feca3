//! On-disk autonomy state
//!
//! ```text
//! <dir>/state.json
//! <dir>/transitions/<id>.json
//! <dir>/reauthorization-requests/<id>.json
//! ```

use super::model::{AutonomyState, ReauthorizationRequest, StateTransition};
use crate::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STATE_FILE: &str = "state.json";
const TRANSITIONS_DIR: &str = "transitions";
const REQUESTS_DIR: &str = "reauthorization-requests";

/// File-backed autonomy state
#[derive(Debug, Clone)]
pub struct StatePersistence {
    dir: PathBuf,
}

impl StatePersistence {
    /// Persistence rooted at `dir`; directories are created on first write
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

    async fn ensure_dir(dir: &Path) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PersistenceError::io(dir, e))
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Serialization {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| PersistenceError::io(path, e))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| PersistenceError::Serialization {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(dir, e)),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistenceError::io(dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(value) = Self::read_json(&path).await? {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Save the current state, replacing the previous one atomically
    ///
    /// # Errors
    /// [`PersistenceError`] on I/O or encoding failure
    pub async fn save_state(&self, state: &AutonomyState) -> Result<(), PersistenceError> {
        Self::ensure_dir(&self.dir).await?;
        Self::write_json(&self.dir.join(STATE_FILE), state).await?;
        tracing::debug!(phase = %state.phase, "autonomy state saved");
        Ok(())
    }

    /// Load the current state; `None` if nothing has been saved
    ///
    /// # Errors
    /// [`PersistenceError`] for any failure other than a missing file
    pub async fn load_state(&self) -> Result<Option<AutonomyState>, PersistenceError> {
        Self::read_json(&self.dir.join(STATE_FILE)).await
    }

    /// Append a transition to the log
    ///
    /// # Errors
    /// [`PersistenceError`] on I/O or encoding failure
    pub async fn save_transition(&self, transition: &StateTransition) -> Result<(), PersistenceError> {
        let dir = self.dir.join(TRANSITIONS_DIR);
        Self::ensure_dir(&dir).await?;
        Self::write_json(&dir.join(format!("{}.json", transition.id)), transition).await
    }

    /// Every saved transition, oldest first
    ///
    /// # Errors
    /// [`PersistenceError`] on I/O or decoding failure
    pub async fn load_transition_history(&self) -> Result<Vec<StateTransition>, PersistenceError> {
        let mut transitions: Vec<StateTransition> = Self::read_all(&self.dir.join(TRANSITIONS_DIR)).await?;
        transitions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(transitions)
    }

    /// Save a reauthorization request
    ///
    /// # Errors
    /// [`PersistenceError`] on I/O or encoding failure
    pub async fn save_reauthorization_request(&self, request: &ReauthorizationRequest) -> Result<(), PersistenceError> {
        let dir = self.dir.join(REQUESTS_DIR);
        Self::ensure_dir(&dir).await?;
        Self::write_json(&dir.join(format!("{}.json", request.id)), request).await
    }

    /// Every saved reauthorization request, newest first
    ///
    /// # Errors
    /// [`PersistenceError`] on I/O or decoding failure
    pub async fn load_reauthorization_requests(&self) -> Result<Vec<ReauthorizationRequest>, PersistenceError> {
        let mut requests: Vec<ReauthorizationRequest> = Self::read_all(&self.dir.join(REQUESTS_DIR)).await?;
        requests.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AutonomyPhase;

    #[tokio::test]
    async fn missing_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatePersistence::new(dir.path().join("autonomy"));
        assert!(store.load_state().await.unwrap().is_none());
        assert!(store.load_transition_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(STATE_FILE), b"{ not json").await.unwrap();
        let store = StatePersistence::new(dir.path());
        assert!(matches!(
            store.load_state().await,
            Err(PersistenceError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatePersistence::new(dir.path());
        store.save_state(&AutonomyState::supervised()).await.unwrap();
        assert!(dir.path().join(STATE_FILE).exists());
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn requests_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatePersistence::new(dir.path());
        let mut older = ReauthorizationRequest::new("owner", "first", AutonomyPhase::Supervised);
        older.timestamp -= chrono::Duration::minutes(5);
        let newer = ReauthorizationRequest::new("owner", "second", AutonomyPhase::Autonomous);
        store.save_reauthorization_request(&older).await.unwrap();
        store.save_reauthorization_request(&newer).await.unwrap();

        let loaded = store.load_reauthorization_requests().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].reason, "second");
        assert_eq!(loaded[1].reason, "first");
    }
}
