//! Context carried from one builder to the next

use super::builder::BuilderFailure;
use crate::checkpoint::{Checkpoint, QaStatus};
use foreman_constitutional::BuildRequest;
use serde::Serialize;

/// Everything a builder needs to resume a task rather than restart it
///
/// A fallback builder receives exactly what the failed builder had. Only
/// the handoff fields are set when the primary fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackContext {
    /// Validated request
    pub request: BuildRequest,
    /// Builder that started the iteration
    pub primary_builder: String,
    /// Why the primary failed, once it has
    pub primary_error: Option<BuilderFailure>,
    /// Checkpoints accumulated so far, oldest first
    pub checkpoints: Vec<Checkpoint>,
    /// Errors seen so far
    pub error_log: Vec<String>,
    /// Iterations completed
    pub iteration: u32,
    /// QA progress so far
    pub qa_progress: QaStatus,
}

impl FallbackContext {
    /// Fresh context for a request
    #[must_use]
    pub fn new(request: BuildRequest, primary_builder: impl Into<String>) -> Self {
        let suite = request.qa_suite();
        let qa_progress = QaStatus::new(suite.total_tests, suite.passing_tests, suite.failing_tests);
        Self {
            request,
            primary_builder: primary_builder.into(),
            primary_error: None,
            checkpoints: Vec::new(),
            error_log: Vec::new(),
            iteration: 0,
            qa_progress,
        }
    }

    /// Task id of the request
    #[inline]
    #[must_use]
    pub fn task_id(&self) -> &str {
        self.request.task_id()
    }

    /// Record the primary failure ahead of a handoff
    #[must_use]
    pub(crate) fn handed_off(mut self, failure: &BuilderFailure) -> Self {
        self.error_log
            .push(format!("{}: {failure}", self.primary_builder));
        self.primary_error = Some(failure.clone());
        self
    }
}
