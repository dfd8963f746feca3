//! Structured rejection payload returned to the Foreman

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference attached to every violation
pub const PHILOSOPHY_REFERENCE: &str = "/BUILD_PHILOSOPHY.md";
/// Workflow reference attached to every violation
pub const WORKFLOW_REFERENCE: &str = "/foreman/qa/qa-first-workflow.md";

/// Violation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Protocol or build-philosophy breach
    BuildPhilosophyViolation,
    /// Constitutional file or rule breach
    ConstitutionalViolation,
}

/// Reason, philosophy and corrective action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDetails {
    /// What was wrong
    pub reason: String,
    /// Principle that was breached
    pub philosophy: String,
    /// What the caller must do
    pub action: String,
}

/// Wire form of a rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPhilosophyViolation {
    /// Violation family
    pub error: ViolationKind,
    /// One-line summary, e.g. `REJECTED: No failing tests`
    pub message: String,
    /// Details
    pub details: ViolationDetails,
    /// Always [`PHILOSOPHY_REFERENCE`]
    pub philosophy_reference: String,
    /// Always [`WORKFLOW_REFERENCE`]
    pub workflow_reference: String,
    /// When the rejection was produced
    pub timestamp: DateTime<Utc>,
}

impl BuildPhilosophyViolation {
    /// Build-philosophy violation stamped now
    pub fn new(
        message: impl Into<String>,
        reason: impl Into<String>,
        philosophy: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            error: ViolationKind::BuildPhilosophyViolation,
            message: message.into(),
            details: ViolationDetails {
                reason: reason.into(),
                philosophy: philosophy.into(),
                action: action.into(),
            },
            philosophy_reference: PHILOSOPHY_REFERENCE.to_string(),
            workflow_reference: WORKFLOW_REFERENCE.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Re-tag as a constitutional violation
    #[inline]
    #[must_use]
    pub fn constitutional(mut self) -> Self {
        self.error = ViolationKind::ConstitutionalViolation;
        self
    }

    /// Corrective action
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.details.action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let v = BuildPhilosophyViolation::new("REJECTED: x", "r", "p", "a");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["error"], "BuildPhilosophyViolation");
        assert_eq!(json["details"]["action"], "a");
        assert_eq!(json["philosophy_reference"], "/BUILD_PHILOSOPHY.md");
        assert_eq!(json["workflow_reference"], "/foreman/qa/qa-first-workflow.md");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn constitutional_retag() {
        let v = BuildPhilosophyViolation::new("m", "r", "p", "a").constitutional();
        assert_eq!(v.error, ViolationKind::ConstitutionalViolation);
    }
}
