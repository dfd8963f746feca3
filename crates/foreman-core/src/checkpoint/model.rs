//! Checkpoint records and lifecycle points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// QA counts captured at a checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QaStatus {
    /// Total tests
    pub total: u64,
    /// Passing tests
    pub passing: u64,
    /// Failing tests
    pub failing: u64,
}

impl QaStatus {
    /// New status
    #[inline]
    #[must_use]
    pub const fn new(total: u64, passing: u64, failing: u64) -> Self {
        Self { total, passing, failing }
    }

    /// Check passing + failing == total
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.passing.checked_add(self.failing) == Some(self.total)
    }

    /// Nothing failing and at least one test
    #[inline]
    #[must_use]
    pub fn is_green(&self) -> bool {
        self.failing == 0 && self.total > 0 && self.passing == self.total
    }
}

/// Assumptions a builder is working under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assumptions {
    /// About the architecture document
    pub architecture: Vec<String>,
    /// About the QA suite
    pub qa: Vec<String>,
}

/// One durable progress record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Derived, collision-resistant id
    pub checkpoint_id: String,
    /// Task being built
    pub task_id: String,
    /// Builder that produced this state
    pub builder: String,
    /// Iterations completed
    pub iteration: u32,
    /// QA counts at this point
    pub qa_status: QaStatus,
    /// Architecture assumptions
    pub architecture_assumptions: Vec<String>,
    /// QA assumptions
    pub qa_assumptions: Vec<String>,
    /// What happens next
    pub next_action: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// The five points at which a checkpoint is taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "point", rename_all = "snake_case")]
pub enum LifecyclePoint {
    /// Before each iteration
    BeforeIteration,
    /// After each QA run
    AfterQa,
    /// Before escalating to the Foreman
    BeforeEscalation {
        /// Why the builder is escalating
        reason: String,
    },
    /// Build reached 100% green
    OnCompletion,
    /// Build stopped without reaching green
    OnFailure {
        /// Why the build failed
        reason: String,
    },
}

impl LifecyclePoint {
    /// Next-action text recorded for this point
    #[must_use]
    pub fn next_action(&self, iteration: u32, qa: &QaStatus) -> String {
        match self {
            Self::BeforeIteration => format!("Iteration {}", iteration.saturating_add(1)),
            Self::AfterQa if qa.failing == 0 => "Build complete".to_string(),
            Self::AfterQa => format!("Fix {} failing tests", qa.failing),
            Self::BeforeEscalation { reason } => format!("Escalating: {reason}"),
            Self::OnCompletion => "Build completed successfully".to_string(),
            Self::OnFailure { reason } => format!("Build failed: {reason}"),
        }
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::BeforeIteration => "before_iteration",
            Self::AfterQa => "after_qa",
            Self::BeforeEscalation { .. } => "before_escalation",
            Self::OnCompletion => "on_completion",
            Self::OnFailure { .. } => "on_failure",
        }
    }
}

/// Context reconstructed from the last valid checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Task being built
    pub task_id: String,
    /// Builder that wrote the checkpoint
    pub builder: String,
    /// Iterations completed
    pub iteration: u32,
    /// QA counts
    pub qa_status: QaStatus,
    /// Assumptions in force
    pub assumptions: Assumptions,
    /// What to do next
    pub next_action: String,
    /// When the checkpoint was taken
    pub timestamp: DateTime<Utc>,
}

impl From<Checkpoint> for ResumePoint {
    fn from(cp: Checkpoint) -> Self {
        Self {
            task_id: cp.task_id,
            builder: cp.builder,
            iteration: cp.iteration,
            qa_status: cp.qa_status,
            assumptions: Assumptions {
                architecture: cp.architecture_assumptions,
                qa: cp.qa_assumptions,
            },
            next_action: cp.next_action,
            timestamp: cp.timestamp,
        }
    }
}
