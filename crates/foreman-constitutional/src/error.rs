//! Error types for the constitutional layer
//!
//! Every rejection that reaches the Foreman carries a
//! [`BuildPhilosophyViolation`] with a corrective action.

use crate::protocol::ProtocolGate;
use crate::secrets::SecretFinding;
use crate::violation::BuildPhilosophyViolation;

/// Errors raised by protocol and constitutional checks
#[derive(Debug, thiserror::Error)]
pub enum ConstitutionalError {
    /// A protocol gate rejected the request
    #[error("gate {gate} failed: {}", violation.message)]
    Protocol {
        /// First failing gate
        gate: ProtocolGate,
        /// Structured rejection
        violation: Box<BuildPhilosophyViolation>,
    },

    /// Request body was not valid JSON for a build request
    #[error("{}", violation.message)]
    MalformedRequest {
        /// Structured rejection
        violation: Box<BuildPhilosophyViolation>,
    },

    /// Request touches protected constitutional paths
    #[error("{}: {}", violation.message, paths.join(", "))]
    ProtectedPath {
        /// Offending paths
        paths: Vec<String>,
        /// Structured rejection
        violation: Box<BuildPhilosophyViolation>,
    },

    /// QA result short of 100% green
    #[error("quality supremacy violated: {reason}")]
    QualitySupremacy {
        /// First shortfall found
        reason: String,
    },

    /// RED to GREEN transition not satisfied
    #[error("{}", violation.message)]
    QaTransition {
        /// Structured rejection
        violation: Box<BuildPhilosophyViolation>,
    },

    /// Hardcoded secrets found
    #[error("{} hardcoded secret(s) detected", findings.len())]
    SecretsDetected {
        /// Redacted findings
        findings: Vec<SecretFinding>,
    },

    /// Governance sink refused an audit event
    #[error("audit sink failed for event {event_id}: {message}")]
    AuditSink {
        /// Event that could not be written
        event_id: String,
        /// Sink error
        message: String,
    },
}

impl ConstitutionalError {
    /// Protocol gate failure
    pub(crate) fn protocol(gate: ProtocolGate, violation: BuildPhilosophyViolation) -> Self {
        Self::Protocol {
            gate,
            violation: Box::new(violation),
        }
    }

    /// Structured rejection, when this error has one
    #[must_use]
    pub fn violation(&self) -> Option<&BuildPhilosophyViolation> {
        match self {
            Self::Protocol { violation, .. }
            | Self::MalformedRequest { violation }
            | Self::ProtectedPath { violation, .. }
            | Self::QaTransition { violation } => Some(violation),
            _ => None,
        }
    }

    /// Failing protocol gate, if any
    #[must_use]
    pub fn gate(&self) -> Option<ProtocolGate> {
        match self {
            Self::Protocol { gate, .. } => Some(*gate),
            _ => None,
        }
    }

    /// True for protocol-level rejections (version, shape, gates)
    #[inline]
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::MalformedRequest { .. })
    }
}
