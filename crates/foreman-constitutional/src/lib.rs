//! Foreman Constitutional Layer
//!
//! Everything a builder must check before and after doing work:
//!
//! - [`ProtocolValidator`]: eight fail-fast Build Protocol v1.1 gates
//! - [`ProtectedPaths`]: constitutional files no build may touch
//! - [`enforce_quality_supremacy`]: 100% passing or total failure
//! - [`SecretScanner`]: pluggable hardcoded-secret detection
//! - [`AuditLogger`]: stamped governance events to a [`GovernanceSink`]
//!
//! Rejections carry a [`BuildPhilosophyViolation`] naming the reason, the
//! principle and the corrective action.

#![warn(unreachable_pub)]

mod audit;
mod error;
mod paths;
mod protocol;
mod quality;
mod request;
mod secrets;
mod violation;

pub use audit::{AuditLogger, GovernanceEvent, GovernanceSink, MemorySink, Severity, SinkError, TracingSink};
pub use error::ConstitutionalError;
pub use paths::{ProtectedPathCheck, ProtectedPaths};
pub use protocol::{ProtocolGate, ProtocolValidator};
pub use quality::{enforce_quality_supremacy, validate_qa_transition, GovernanceDecision, QaResult};
pub use request::{
    ArchitectureRef, BuildRequest, Priority, QaSuite, QaSuiteStatus, RawArchitecture, RawBuildRequest,
    RawMetadata, RawQaSuite, RequestMetadata, BUILD_INSTRUCTION, PROTOCOL_VERSION,
};
pub use secrets::{PatternDetector, Preview, SecretDetector, SecretFinding, SecretScan, SecretScanner};
pub use violation::{
    BuildPhilosophyViolation, ViolationDetails, ViolationKind, PHILOSOPHY_REFERENCE, WORKFLOW_REFERENCE,
};
