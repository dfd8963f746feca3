//! Autonomy state documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Autonomy phase of the Foreman
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyPhase {
    /// Builds run, a human reviews every merge
    Supervised,
    /// Builds run and merge on a green gate
    Autonomous,
    /// Builds halted by the owner
    Paused,
    /// Builds halted until the owner reauthorizes
    AwaitingReauthorization,
    /// Autonomy withdrawn; only the owner can restore supervision
    Revoked,
}

impl AutonomyPhase {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supervised => "supervised",
            Self::Autonomous => "autonomous",
            Self::Paused => "paused",
            Self::AwaitingReauthorization => "awaiting_reauthorization",
            Self::Revoked => "revoked",
        }
    }

    /// Whether builds may start in this phase
    #[inline]
    #[must_use]
    pub fn allows_builds(self) -> bool {
        matches!(self, Self::Supervised | Self::Autonomous)
    }

    /// Whether `self -> to` is a permitted transition
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        use AutonomyPhase as P;
        matches!(
            (self, to),
            (P::Supervised, P::Autonomous | P::Paused | P::Revoked)
                | (P::Autonomous, P::Supervised | P::Paused | P::AwaitingReauthorization | P::Revoked)
                | (P::Paused, P::Supervised | P::AwaitingReauthorization | P::Revoked)
                | (P::AwaitingReauthorization, P::Supervised | P::Autonomous | P::Revoked)
                | (P::Revoked, P::Supervised)
        )
    }
}

impl fmt::Display for AutonomyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System condition captured when the owner approved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemState {
    /// When it was captured
    pub timestamp: DateTime<Utc>,
    /// QA fully green at the time
    pub qa_green: bool,
    /// Open incidents at the time
    pub open_incidents: u32,
}

/// Owner sign-off on the current phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerApproval {
    /// Approver
    pub approved_by: String,
    /// When approved
    pub timestamp: DateTime<Utc>,
    /// System condition at approval
    pub system_state: SystemState,
}

/// One phase change; never rewritten once saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    /// Unique id, also the file name
    pub id: String,
    /// Phase before
    pub from: AutonomyPhase,
    /// Phase after
    pub to: AutonomyPhase,
    /// Why
    pub reason: String,
    /// Who or what caused it
    pub triggered_by: String,
    /// When
    pub timestamp: DateTime<Utc>,
}

impl StateTransition {
    /// New transition stamped now
    #[must_use]
    pub fn new(
        from: AutonomyPhase,
        to: AutonomyPhase,
        reason: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("transition-{}", ulid::Ulid::new().to_string().to_lowercase()),
            from,
            to,
            reason: reason.into(),
            triggered_by: triggered_by.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Current autonomy state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutonomyState {
    /// Current phase
    pub phase: AutonomyPhase,
    /// When the phase last changed
    pub last_transition: DateTime<Utc>,
    /// Transitions applied, oldest first
    #[serde(default)]
    pub transition_history: Vec<StateTransition>,
    /// Owner approval of the current phase, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_approval: Option<OwnerApproval>,
}

impl AutonomyState {
    /// Initial supervised state
    #[must_use]
    pub fn supervised() -> Self {
        Self {
            phase: AutonomyPhase::Supervised,
            last_transition: Utc::now(),
            transition_history: Vec::new(),
            owner_approval: None,
        }
    }
}

impl Default for AutonomyState {
    fn default() -> Self {
        Self::supervised()
    }
}

/// Request to leave a halted phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReauthorizationRequest {
    /// Unique id, also the file name
    pub id: String,
    /// Who asks
    pub requester: String,
    /// Why
    pub reason: String,
    /// Phase requested
    pub requested_phase: AutonomyPhase,
    /// When
    pub timestamp: DateTime<Utc>,
}

impl ReauthorizationRequest {
    /// New request stamped now
    #[must_use]
    pub fn new(requester: impl Into<String>, reason: impl Into<String>, requested_phase: AutonomyPhase) -> Self {
        Self {
            id: format!("reauth-{}", ulid::Ulid::new().to_string().to_lowercase()),
            requester: requester.into(),
            reason: reason.into(),
            requested_phase,
            timestamp: Utc::now(),
        }
    }
}
