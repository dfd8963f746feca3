//! Checkpoint storage
//!
//! One interface, two backends. The file store keeps one JSON document per
//! checkpoint id and treats its cache as a read-through layer only; listing
//! always scans the directory so a cold cache never hides checkpoints.

use super::model::Checkpoint;
use super::validate_structure;
use crate::error::CheckpointError;
use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage for checkpoints
#[async_trait]
pub trait CheckpointStore: Debug + Send + Sync {
    /// Persist a checkpoint; returns once the write is durable
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Checkpoint by id
    async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Every checkpoint of a task, oldest first
    async fn list(&self, task_id: &str) -> Result<Vec<Checkpoint>, CheckpointError>;

    /// Delete a checkpoint; false if it did not exist
    async fn remove(&self, checkpoint_id: &str) -> Result<bool, CheckpointError>;
}

fn sort_chronologically(checkpoints: &mut [Checkpoint]) {
    checkpoints.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.iteration.cmp(&b.iteration))
    });
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: DashMap<String, Checkpoint>,
}

impl MemoryCheckpointStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.entries
            .insert(checkpoint.checkpoint_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.entries.get(checkpoint_id).map(|e| e.value().clone()))
    }

    async fn list(&self, task_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let mut found: Vec<Checkpoint> = self
            .entries
            .iter()
            .filter(|e| e.task_id == task_id)
            .map(|e| e.value().clone())
            .collect();
        sort_chronologically(&mut found);
        Ok(found)
    }

    async fn remove(&self, checkpoint_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.entries.remove(checkpoint_id).is_some())
    }
}

/// One JSON file per checkpoint with a read-through cache
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    cache: Cache<String, Arc<Checkpoint>>,
}

impl FileCheckpointStore {
    /// Store rooted at `dir`; the directory is created on first write
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, cache_capacity: u64) -> Self {
        Self {
            dir: dir.into(),
            cache: Cache::new(cache_capacity),
        }
    }

    /// Storage directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `checkpoint_id`, or None for ids that are not plain names
    #[must_use]
    pub fn path_for(&self, checkpoint_id: &str) -> Option<PathBuf> {
        let plain = !checkpoint_id.is_empty()
            && !checkpoint_id.contains(|c: char| c == '/' || c == '\\')
            && !checkpoint_id.contains("..");
        plain.then(|| self.dir.join(format!("{checkpoint_id}.json")))
    }

    async fn read_file(&self, checkpoint_id: &str, path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::io(path, e)),
        };
        let corrupted = |reasons: Vec<String>| CheckpointError::Corrupted {
            checkpoint_id: checkpoint_id.to_string(),
            reasons,
        };
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| corrupted(vec![format!("invalid JSON: {e}")]))?;
        validate_structure(&value).map_err(corrupted)?;
        let checkpoint: Checkpoint = serde_json::from_value(value)?;
        Ok(Some(checkpoint))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let id = &checkpoint.checkpoint_id;
        let path = self.path_for(id).ok_or_else(|| CheckpointError::Corrupted {
            checkpoint_id: id.clone(),
            reasons: vec!["checkpoint id is not a plain file name".into()],
        })?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CheckpointError::io(&self.dir, e))?;

        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| CheckpointError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CheckpointError::io(&path, e))?;

        self.cache.insert(id.clone(), Arc::new(checkpoint.clone())).await;
        tracing::debug!(checkpoint_id = %id, path = %path.display(), "checkpoint written");
        Ok(())
    }

    async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        if let Some(hit) = self.cache.get(checkpoint_id).await {
            return Ok(Some(hit.as_ref().clone()));
        }
        let Some(path) = self.path_for(checkpoint_id) else {
            return Ok(None);
        };
        let loaded = self.read_file(checkpoint_id, &path).await?;
        if let Some(checkpoint) = &loaded {
            self.cache
                .insert(checkpoint_id.to_string(), Arc::new(checkpoint.clone()))
                .await;
        }
        Ok(loaded)
    }

    async fn list(&self, task_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CheckpointError::io(&self.dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CheckpointError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.get(id).await {
                Ok(Some(cp)) if cp.task_id == task_id => found.push(cp),
                Ok(_) => {}
                Err(CheckpointError::Corrupted { checkpoint_id, reasons }) => {
                    tracing::warn!(%checkpoint_id, ?reasons, "skipping unreadable checkpoint");
                }
                Err(e) => return Err(e),
            }
        }
        sort_chronologically(&mut found);
        Ok(found)
    }

    async fn remove(&self, checkpoint_id: &str) -> Result<bool, CheckpointError> {
        let Some(path) = self.path_for(checkpoint_id) else {
            return Ok(false);
        };
        self.cache.invalidate(checkpoint_id).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CheckpointError::io(&path, e)),
        }
    }
}
