//! Error types for Foreman Core
//!
//! The taxonomy follows how each failure must be handled:
//! - Protocol violations fail closed and are never retried
//! - Constitutional violations always block
//! - Escalation conditions go to a human via the Foreman channel
//! - Integrity violations are fatal and treated as tampering
//! - Transient builder failures trigger fallback, and only those are
//!   recovered locally

use crate::escalation::EscalationRequest;
use crate::fallback::BuilderFailure;
use foreman_constitutional::ConstitutionalError;
use std::path::PathBuf;

/// Main Foreman error type
#[derive(Debug, thiserror::Error)]
pub enum ForemanError {
    /// Request is malformed or outside the build protocol
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[source] ConstitutionalError),

    /// Protected path, leaked secret or sub-100% QA
    #[error("constitutional violation: {0}")]
    ConstitutionalViolation(#[source] ConstitutionalError),

    /// Governance sink refused an event
    #[error("audit failure: {0}")]
    Audit(#[source] ConstitutionalError),

    /// Situation a builder must not resolve alone
    #[error("escalation required: {}", .0.issue)]
    EscalationCondition(Box<EscalationRequest>),

    /// Stored data no longer matches its recorded hash or invariant
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Builder failed and no fallback was taken
    #[error("builder {builder} failed: {failure}")]
    BuilderFailed {
        /// Failing builder
        builder: String,
        /// What went wrong
        failure: BuilderFailure,
    },

    /// Every builder in the fallback chain failed
    #[error("BuilderNetworkFailure: All builders failed, escalating to Foreman")]
    BuilderNetworkFailure {
        /// Task being built
        task_id: String,
        /// Builders tried, in order
        attempted: Vec<String>,
        /// Failure from the last builder tried
        last_failure: BuilderFailure,
    },

    /// No builder registered under this name
    #[error("unknown builder: {0}")]
    UnknownBuilder(String),

    /// Autonomy state forbids building
    #[error("builds blocked: autonomy is {phase}")]
    AutonomyBlocked {
        /// Current phase
        phase: String,
    },

    /// Foreman channel did not accept an escalation
    #[error("escalation channel failed: {0}")]
    EscalationChannel(String),

    /// Checkpoint storage
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// State persistence
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ConstitutionalError> for ForemanError {
    fn from(err: ConstitutionalError) -> Self {
        if err.is_protocol() {
            Self::ProtocolViolation(err)
        } else if matches!(err, ConstitutionalError::AuditSink { .. }) {
            Self::Audit(err)
        } else {
            Self::ConstitutionalViolation(err)
        }
    }
}

impl ForemanError {
    /// Escalation from a request
    #[inline]
    #[must_use]
    pub fn escalation(request: EscalationRequest) -> Self {
        Self::EscalationCondition(Box::new(request))
    }

    /// Check if a human has to act
    #[inline]
    #[must_use]
    pub fn requires_human(&self) -> bool {
        matches!(
            self,
            Self::EscalationCondition(_) | Self::BuilderNetworkFailure { .. } | Self::IntegrityViolation(_)
        )
    }

    /// Check if a fallback builder may still recover this
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BuilderFailed { failure, .. } if failure.is_transient())
    }
}

/// Checkpoint storage errors
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Filesystem failure
    #[error("checkpoint io error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Encoding failure
    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored checkpoint fails structure or integrity validation
    #[error("checkpoint {checkpoint_id} is corrupted: {}", reasons.join("; "))]
    Corrupted {
        /// Offending checkpoint
        checkpoint_id: String,
        /// Validation failures
        reasons: Vec<String>,
    },

    /// QA counts violate passing + failing == total
    #[error("invalid QA status: {passing} passing + {failing} failing != {total} total")]
    InvalidQaStatus {
        /// Total tests
        total: u64,
        /// Passing tests
        passing: u64,
        /// Failing tests
        failing: u64,
    },
}

impl CheckpointError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Autonomy state persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("state io error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Stored document could not be decoded
    #[error("state file {path} is invalid: {source}")]
    Serialization {
        /// Offending file
        path: PathBuf,
        /// Decoder error
        source: serde_json::Error,
    },

    /// Phase change not permitted
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition {
        /// Current phase
        from: String,
        /// Requested phase
        to: String,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML did not match the schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid value
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}
