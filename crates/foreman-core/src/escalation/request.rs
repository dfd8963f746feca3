//! Escalation requests sent to the Foreman

use crate::checkpoint::QaStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a builder is escalating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationType {
    /// Retries exhausted or builders unavailable
    NonRecoverableError,
    /// Architecture incomplete or contradicted by tests
    ArchitecturalAmbiguity,
    /// Unsure whether an action is constitutionally permitted
    ConstitutionalUncertainty,
}

impl EscalationType {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonRecoverableError => "non_recoverable_error",
            Self::ArchitecturalAmbiguity => "architectural_ambiguity",
            Self::ConstitutionalUncertainty => "constitutional_uncertainty",
        }
    }
}

impl fmt::Display for EscalationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed escalation context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDetails {
    /// Last error seen
    pub error_message: String,
    /// Fixes already tried
    #[serde(default)]
    pub attempted_fixes: Vec<String>,
    /// Architecture document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture_reference: Option<String>,
    /// QA suite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_suite_reference: Option<String>,
    /// QA counts when escalating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_qa_status: Option<QaStatus>,
}

/// Request for Foreman or human intervention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRequest {
    /// Category
    pub escalation_type: EscalationType,
    /// Escalating builder
    pub builder: String,
    /// Task being built
    pub task_id: String,
    /// One-line problem statement
    pub issue: String,
    /// Supporting context
    pub details: EscalationDetails,
    /// What the builder thinks would unblock it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_resolution: Option<String>,
    /// When the request was raised
    pub timestamp: DateTime<Utc>,
}

impl EscalationRequest {
    /// New request stamped now
    #[must_use]
    pub fn new(
        escalation_type: EscalationType,
        builder: impl Into<String>,
        task_id: impl Into<String>,
        issue: impl Into<String>,
    ) -> Self {
        let issue = issue.into();
        Self {
            escalation_type,
            builder: builder.into(),
            task_id: task_id.into(),
            details: EscalationDetails {
                error_message: issue.clone(),
                ..EscalationDetails::default()
            },
            issue,
            suggested_resolution: None,
            timestamp: Utc::now(),
        }
    }

    /// With details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: EscalationDetails) -> Self {
        self.details = details;
        self
    }

    /// With suggested resolution
    #[inline]
    #[must_use]
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.suggested_resolution = Some(resolution.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let request = EscalationRequest::new(EscalationType::NonRecoverableError, "copilot", "t1", "stuck")
            .with_resolution("Review QA suite");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["escalation_type"], "non_recoverable_error");
        assert_eq!(json["details"]["error_message"], "stuck");
        assert_eq!(json["suggested_resolution"], "Review QA suite");
        assert!(json["details"].get("architecture_reference").is_none());
    }
}
