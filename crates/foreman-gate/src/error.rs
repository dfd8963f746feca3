//! Error types for gate execution
//!
//! A control that fails is not an error; it is a `FAIL` result. Errors here
//! mean the gate itself could not reach a verdict, and merge stays blocked.

use foreman_constitutional::ConstitutionalError;
use foreman_evidence::SnapshotError;
use std::time::Duration;

/// Gate could not produce a result
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Evidence snapshot failed its precondition check
    #[error("evidence snapshot rejected: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The run did not finish before the deadline
    #[error("governance gate exceeded {timeout:?} after {completed} control(s)")]
    DeadlineExceeded {
        /// Configured ceiling
        timeout: Duration,
        /// Controls that finished before the deadline
        completed: usize,
    },

    /// A control set lacks one or more of the nine controls
    #[error("control set incomplete: {0} missing")]
    MissingControl(String),

    /// Governance sink refused the gate outcome
    #[error("audit failure: {0}")]
    Audit(#[from] ConstitutionalError),
}

impl GateError {
    /// True when the failure points at altered evidence
    #[inline]
    #[must_use]
    pub fn is_tampering(&self) -> bool {
        matches!(self, Self::Snapshot(e) if e.is_tampering())
    }
}
