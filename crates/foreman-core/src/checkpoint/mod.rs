//! Checkpoint engine
//!
//! Records builder progress at five fixed lifecycle points so a build can be
//! resumed, by the same builder or a fallback, after a crash or handoff:
//! - before each iteration
//! - after each QA run
//! - before any escalation
//! - on completion
//! - on failure
//!
//! A lifecycle call returns only after its checkpoint write is durable.

mod model;
mod store;

pub use model::{Assumptions, Checkpoint, LifecyclePoint, QaStatus, ResumePoint};
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};

use crate::config::ForemanConfig;
use crate::error::CheckpointError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use ulid::Ulid;

const REQUIRED_FIELDS: [&str; 9] = [
    "checkpoint_id",
    "task_id",
    "builder",
    "iteration",
    "qa_status",
    "architecture_assumptions",
    "qa_assumptions",
    "next_action",
    "timestamp",
];

/// Check a raw checkpoint document has every field with a usable type
///
/// # Errors
/// Every problem found, not just the first
pub fn validate_structure(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let Some(obj) = value.as_object() else {
        return Err(vec!["checkpoint is not a JSON object".into()]);
    };

    let mut problems: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !obj.contains_key(**f))
        .map(|f| format!("missing field: {f}"))
        .collect();

    if obj.get("iteration").is_some_and(|v| v.as_u64().is_none()) {
        problems.push("iteration must be a non-negative integer".into());
    }
    if let Some(qa) = obj.get("qa_status") {
        for key in ["total", "passing", "failing"] {
            if qa.get(key).and_then(serde_json::Value::as_u64).is_none() {
                problems.push(format!("qa_status.{key} must be a non-negative integer"));
            }
        }
    }
    if let Some(ts) = obj.get("timestamp") {
        let parses = ts
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
        if !parses {
            problems.push("timestamp is not a valid ISO-8601 date".into());
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

/// Check the QA invariant and identity fields of a checkpoint
///
/// # Errors
/// Every problem found
pub fn validate_integrity(checkpoint: &Checkpoint) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    if checkpoint.checkpoint_id.is_empty() {
        problems.push("checkpoint_id is empty".to_string());
    }
    if checkpoint.task_id.is_empty() {
        problems.push("task_id is empty".to_string());
    }
    let qa = &checkpoint.qa_status;
    if !qa.is_consistent() {
        problems.push(format!(
            "passing ({}) + failing ({}) != total ({})",
            qa.passing, qa.failing, qa.total
        ));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

fn generate_checkpoint_id(task_id: &str, builder: &str, iteration: u32) -> String {
    let seed = format!("{task_id}:{builder}:{iteration}:{}", Ulid::new());
    hex::encode(&blake3::hash(seed.as_bytes()).as_bytes()[..8])
}

/// Everything about a build except the lifecycle point
#[derive(Debug, Clone, Copy)]
pub struct CheckpointSeed<'a> {
    /// Task being built
    pub task_id: &'a str,
    /// Builder doing the work
    pub builder: &'a str,
    /// Iterations completed
    pub iteration: u32,
    /// Current QA counts
    pub qa_status: QaStatus,
    /// Assumptions in force
    pub assumptions: &'a Assumptions,
}

/// Creates, queries and validates checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointEngine {
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointEngine {
    /// Engine over any store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Engine over an in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCheckpointStore::new()))
    }

    /// Engine over the configured checkpoint directory
    #[must_use]
    pub fn from_config(config: &ForemanConfig) -> Self {
        Self::new(Arc::new(FileCheckpointStore::new(
            config.checkpoint_dir.clone(),
            config.checkpoint_cache_capacity,
        )))
    }

    /// Create and durably store a checkpoint
    ///
    /// # Errors
    /// [`CheckpointError::InvalidQaStatus`] if the counts do not add up,
    /// otherwise any storage error
    pub async fn create(
        &self,
        task_id: &str,
        builder: &str,
        iteration: u32,
        qa_status: QaStatus,
        assumptions: &Assumptions,
        next_action: impl Into<String>,
    ) -> Result<Checkpoint, CheckpointError> {
        if !qa_status.is_consistent() {
            return Err(CheckpointError::InvalidQaStatus {
                total: qa_status.total,
                passing: qa_status.passing,
                failing: qa_status.failing,
            });
        }

        let checkpoint = Checkpoint {
            checkpoint_id: generate_checkpoint_id(task_id, builder, iteration),
            task_id: task_id.to_string(),
            builder: builder.to_string(),
            iteration,
            qa_status,
            architecture_assumptions: assumptions.architecture.clone(),
            qa_assumptions: assumptions.qa.clone(),
            next_action: next_action.into(),
            timestamp: Utc::now(),
        };
        self.store.put(&checkpoint).await?;

        tracing::info!(
            checkpoint_id = %checkpoint.checkpoint_id,
            task_id,
            builder,
            iteration,
            passing = qa_status.passing,
            total = qa_status.total,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Checkpoint at a lifecycle point
    ///
    /// # Errors
    /// As [`CheckpointEngine::create`]
    pub async fn checkpoint(
        &self,
        point: &LifecyclePoint,
        seed: &CheckpointSeed<'_>,
    ) -> Result<Checkpoint, CheckpointError> {
        let next_action = point.next_action(seed.iteration, &seed.qa_status);
        let checkpoint = self
            .create(
                seed.task_id,
                seed.builder,
                seed.iteration,
                seed.qa_status,
                seed.assumptions,
                next_action,
            )
            .await?;
        metrics::counter!("foreman_checkpoints_total", "point" => point.label()).increment(1);
        Ok(checkpoint)
    }

    /// All checkpoints of a task, oldest first
    ///
    /// # Errors
    /// Storage errors
    pub async fn list_by_task(&self, task_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        self.store.list(task_id).await
    }

    /// Checkpoint by id
    ///
    /// # Errors
    /// Storage errors, or [`CheckpointError::Corrupted`] for unreadable files
    pub async fn get_by_id(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        self.store.get(checkpoint_id).await
    }

    /// Most recent checkpoint of a task
    ///
    /// # Errors
    /// Storage errors
    pub async fn last_for_task(&self, task_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.store.list(task_id).await?.pop())
    }

    /// True if the checkpoint is missing, unreadable or fails integrity
    pub async fn is_corrupted(&self, checkpoint_id: &str) -> bool {
        match self.store.get(checkpoint_id).await {
            Ok(Some(checkpoint)) => validate_integrity(&checkpoint).is_err(),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(checkpoint_id, error = %e, "checkpoint unreadable");
                true
            }
        }
    }

    /// Resume context from the last checkpoint, only if it is intact
    ///
    /// # Errors
    /// Storage errors
    pub async fn resume_from(&self, task_id: &str) -> Result<Option<ResumePoint>, CheckpointError> {
        let Some(last) = self.last_for_task(task_id).await? else {
            return Ok(None);
        };
        if let Err(problems) = validate_integrity(&last) {
            tracing::warn!(
                task_id,
                checkpoint_id = %last.checkpoint_id,
                ?problems,
                "last checkpoint failed integrity, not resuming"
            );
            return Ok(None);
        }
        Ok(Some(last.into()))
    }

    /// Remove every checkpoint of a task; only for task teardown
    ///
    /// # Errors
    /// Storage errors; checkpoints removed before the error stay removed
    pub async fn clear(&self, task_id: &str) -> Result<usize, CheckpointError> {
        let mut removed = 0;
        for checkpoint in self.store.list(task_id).await? {
            if self.store.remove(&checkpoint.checkpoint_id).await? {
                removed += 1;
            }
        }
        tracing::info!(task_id, removed, "checkpoints cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assumptions() -> Assumptions {
        Assumptions {
            architecture: vec!["REST API".into()],
            qa: vec!["jest".into()],
        }
    }

    #[tokio::test]
    async fn create_and_query() {
        let engine = CheckpointEngine::in_memory();
        let cp = engine
            .create("t1", "copilot", 1, QaStatus::new(10, 4, 6), &assumptions(), "Iteration 2")
            .await
            .unwrap();
        assert_eq!(cp.checkpoint_id.len(), 16);
        assert_eq!(engine.get_by_id(&cp.checkpoint_id).await.unwrap(), Some(cp.clone()));
        assert_eq!(engine.list_by_task("t1").await.unwrap().len(), 1);
        assert!(!engine.is_corrupted(&cp.checkpoint_id).await);
    }

    #[tokio::test]
    async fn ids_are_unique_for_identical_inputs() {
        let engine = CheckpointEngine::in_memory();
        let a = engine
            .create("t1", "copilot", 1, QaStatus::new(1, 0, 1), &assumptions(), "x")
            .await
            .unwrap();
        let b = engine
            .create("t1", "copilot", 1, QaStatus::new(1, 0, 1), &assumptions(), "x")
            .await
            .unwrap();
        assert_ne!(a.checkpoint_id, b.checkpoint_id);
    }

    #[tokio::test]
    async fn inconsistent_counts_are_refused() {
        let engine = CheckpointEngine::in_memory();
        let err = engine
            .create("t1", "copilot", 1, QaStatus::new(10, 4, 5), &assumptions(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidQaStatus { total: 10, .. }));
        assert!(engine.list_by_task("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lifecycle_checkpoint_sets_next_action() {
        let engine = CheckpointEngine::in_memory();
        let arch = assumptions();
        let seed = CheckpointSeed {
            task_id: "t1",
            builder: "ui",
            iteration: 3,
            qa_status: QaStatus::new(8, 6, 2),
            assumptions: &arch,
        };
        let cp = engine.checkpoint(&LifecyclePoint::AfterQa, &seed).await.unwrap();
        assert_eq!(cp.next_action, "Fix 2 failing tests");
        assert_eq!(cp.architecture_assumptions, vec!["REST API".to_string()]);
    }

    #[tokio::test]
    async fn missing_checkpoint_is_corrupted() {
        assert!(CheckpointEngine::in_memory().is_corrupted("nope").await);
    }

    #[tokio::test]
    async fn resume_refuses_invalid_last_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = CheckpointEngine::new(store.clone());
        let good = engine
            .create("t1", "copilot", 1, QaStatus::new(10, 5, 5), &assumptions(), "Iteration 2")
            .await
            .unwrap();
        let resumed = engine.resume_from("t1").await.unwrap().unwrap();
        assert_eq!(resumed.iteration, 1);
        assert_eq!(resumed.assumptions, assumptions());

        let mut bad = good.clone();
        bad.checkpoint_id = "tampered".into();
        bad.qa_status = QaStatus::new(10, 5, 4);
        bad.timestamp = good.timestamp + chrono::Duration::seconds(1);
        store.put(&bad).await.unwrap();

        assert!(engine.is_corrupted("tampered").await);
        assert!(engine.resume_from("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_only_the_task() {
        let engine = CheckpointEngine::in_memory();
        for i in 0..3 {
            engine
                .create("t1", "copilot", i, QaStatus::new(2, 1, 1), &assumptions(), "x")
                .await
                .unwrap();
        }
        engine
            .create("t2", "copilot", 0, QaStatus::new(2, 1, 1), &assumptions(), "x")
            .await
            .unwrap();
        assert_eq!(engine.clear("t1").await.unwrap(), 3);
        assert!(engine.last_for_task("t1").await.unwrap().is_none());
        assert!(engine.last_for_task("t2").await.unwrap().is_some());
    }

    #[test]
    fn structure_reports_every_problem() {
        let problems = validate_structure(&json!({
            "checkpoint_id": "x",
            "iteration": -1,
            "qa_status": {"total": 3, "passing": -1},
            "timestamp": "yesterday"
        }))
        .unwrap_err();
        assert!(problems.contains(&"missing field: task_id".to_string()));
        assert!(problems.contains(&"iteration must be a non-negative integer".to_string()));
        assert!(problems.contains(&"qa_status.passing must be a non-negative integer".to_string()));
        assert!(problems.contains(&"qa_status.failing must be a non-negative integer".to_string()));
        assert!(problems.contains(&"timestamp is not a valid ISO-8601 date".to_string()));
    }

    #[test]
    fn structure_accepts_serialized_checkpoint() {
        let cp = Checkpoint {
            checkpoint_id: "abc".into(),
            task_id: "t1".into(),
            builder: "local".into(),
            iteration: 0,
            qa_status: QaStatus::new(1, 0, 1),
            architecture_assumptions: vec![],
            qa_assumptions: vec![],
            next_action: "Iteration 1".into(),
            timestamp: Utc::now(),
        };
        assert!(validate_structure(&serde_json::to_value(&cp).unwrap()).is_ok());
        assert!(validate_integrity(&cp).is_ok());
    }
}
