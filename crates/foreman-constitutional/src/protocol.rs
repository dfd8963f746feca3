//! Build protocol v1.1 gates
//!
//! Eight ordered, fail-fast gates decide whether a builder may accept a
//! request:
//!
//! 1. protocol version is `1.1`
//! 2. instruction is `Build to Green`
//! 3. an architecture reference is present
//! 4. a QA suite is present
//! 5. the QA suite is RED
//! 6. at least one test is failing
//! 7. acceptance criteria are present
//! 8. metadata carries a task id
//!
//! The first failing gate produces the rejection; later gates are not
//! evaluated.

use crate::error::ConstitutionalError;
use crate::paths::ProtectedPaths;
use crate::request::{
    ArchitectureRef, BuildRequest, QaSuite, QaSuiteStatus, RawBuildRequest, RequestMetadata,
    BUILD_INSTRUCTION, PROTOCOL_VERSION,
};
use crate::violation::BuildPhilosophyViolation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One protocol gate, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolGate {
    /// Gate 1
    ProtocolVersion,
    /// Gate 2
    Instruction,
    /// Gate 3
    Architecture,
    /// Gate 4
    QaSuite,
    /// Gate 5
    QaStatus,
    /// Gate 6
    FailingTests,
    /// Gate 7
    AcceptanceCriteria,
    /// Gate 8
    Metadata,
}

impl ProtocolGate {
    /// All gates in evaluation order
    pub const ALL: [ProtocolGate; 8] = [
        Self::ProtocolVersion,
        Self::Instruction,
        Self::Architecture,
        Self::QaSuite,
        Self::QaStatus,
        Self::FailingTests,
        Self::AcceptanceCriteria,
        Self::Metadata,
    ];

    /// 1-based gate number
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8 + 1
    }
}

impl fmt::Display for ProtocolGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProtocolVersion => "protocol version",
            Self::Instruction => "instruction",
            Self::Architecture => "architecture",
            Self::QaSuite => "qa suite",
            Self::QaStatus => "qa status",
            Self::FailingTests => "failing tests",
            Self::AcceptanceCriteria => "acceptance criteria",
            Self::Metadata => "metadata",
        };
        write!(f, "{} ({name})", self.number())
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

/// Validates raw requests against the protocol gates
#[derive(Debug, Clone, Default)]
pub struct ProtocolValidator {
    protected: ProtectedPaths,
}

impl ProtocolValidator {
    /// Validator with the default protected-path table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom protected-path table
    #[inline]
    #[must_use]
    pub fn with_protected_paths(mut self, protected: ProtectedPaths) -> Self {
        self.protected = protected;
        self
    }

    /// Protected-path table in use
    #[inline]
    #[must_use]
    pub fn protected_paths(&self) -> &ProtectedPaths {
        &self.protected
    }

    /// Run the eight gates
    ///
    /// # Errors
    /// [`ConstitutionalError::Protocol`] naming the first failing gate
    pub fn validate(&self, raw: &RawBuildRequest) -> Result<BuildRequest, ConstitutionalError> {
        let result = Self::run_gates(raw);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "build request rejected");
        }
        result
    }

    /// Run the gates, then reject if any listed file is protected
    ///
    /// # Errors
    /// Gate failure, or [`ConstitutionalError::ProtectedPath`]
    pub fn accept(&self, raw: &RawBuildRequest) -> Result<BuildRequest, ConstitutionalError> {
        let request = self.validate(raw)?;
        self.protected.validate(request.files())?;
        tracing::info!(task_id = request.task_id(), files = request.files().len(), "build request accepted");
        Ok(request)
    }

    /// Parse JSON and [`accept`](Self::accept) it
    ///
    /// # Errors
    /// [`ConstitutionalError::MalformedRequest`] if the body does not parse
    pub fn parse_json(&self, body: &str) -> Result<BuildRequest, ConstitutionalError> {
        let raw: RawBuildRequest = serde_json::from_str(body).map_err(|e| {
            ConstitutionalError::MalformedRequest {
                violation: Box::new(BuildPhilosophyViolation::new(
                    "REJECTED: Malformed request",
                    format!("Request body is not a valid build request: {e}"),
                    "Builder Protocol v1.1 is required for constitutional compliance",
                    "Foreman must send a well-formed Builder Protocol v1.1 request",
                )),
            }
        })?;
        self.accept(&raw)
    }

    fn run_gates(raw: &RawBuildRequest) -> Result<BuildRequest, ConstitutionalError> {
        use ProtocolGate as G;

        // Gate 1: an absent version means the current one
        if let Some(version) = raw.protocol_version.as_deref().filter(|v| *v != PROTOCOL_VERSION) {
            return Err(ConstitutionalError::protocol(
                G::ProtocolVersion,
                BuildPhilosophyViolation::new(
                    "REJECTED: Invalid protocol version",
                    format!("Protocol version must be \"1.1\", received: {version}"),
                    "Builder Protocol v1.1 is required for constitutional compliance",
                    "Update request to use protocol version \"1.1\"",
                ),
            ));
        }

        // Gate 2
        let instruction = raw.instruction.as_deref();
        if instruction != Some(BUILD_INSTRUCTION) {
            return Err(ConstitutionalError::protocol(
                G::Instruction,
                BuildPhilosophyViolation::new(
                    "REJECTED: Invalid build instruction",
                    format!(
                        "Instruction must be \"Build to Green\", received: \"{}\"",
                        instruction.unwrap_or("none")
                    ),
                    "Build Philosophy requires QA-driven building",
                    "Foreman must provide \"Build to Green\" instruction with Red QA",
                ),
            ));
        }

        // Gate 3
        let Some((reference, summary)) = raw.architecture.as_ref().and_then(|a| {
            non_empty(a.reference.as_ref()).map(|r| (r.to_string(), a.summary.clone()))
        }) else {
            return Err(ConstitutionalError::protocol(
                G::Architecture,
                BuildPhilosophyViolation::new(
                    "REJECTED: No architecture provided",
                    "Builders require architecture specification to build against",
                    "Architecture defines what \"correct\" means",
                    "Foreman must design architecture before creating build request",
                ),
            ));
        };

        // Gate 4
        let Some(suite) = raw.qa_suite.as_ref() else {
            return Err(ConstitutionalError::protocol(
                G::QaSuite,
                BuildPhilosophyViolation::new(
                    "REJECTED: No QA suite provided",
                    "Builders require failing QA to know what to build",
                    "Red QA is the build specification",
                    "Foreman must create comprehensive QA suite before building",
                ),
            ));
        };

        // Gate 5
        if suite.current_status != Some(QaSuiteStatus::Red) {
            let action = if suite.current_status == Some(QaSuiteStatus::Green) {
                "QA is already green. Nothing to build."
            } else {
                "Foreman must run QA to verify it's failing before building"
            };
            let received = suite
                .current_status
                .map_or_else(|| "none".to_string(), |s| s.to_string());
            return Err(ConstitutionalError::protocol(
                G::QaStatus,
                BuildPhilosophyViolation::new(
                    "REJECTED: QA must be RED (failing)",
                    format!("QA status must be RED, received: {received}"),
                    "Red QA means \"architecture exists, implementation missing\"",
                    action,
                ),
            ));
        }

        // Gate 6
        let failing = suite.failing_tests.unwrap_or(0);
        if failing == 0 {
            return Err(ConstitutionalError::protocol(
                G::FailingTests,
                BuildPhilosophyViolation::new(
                    "REJECTED: No failing tests",
                    "No failing tests means nothing to build",
                    "Failing tests define what needs to be implemented",
                    "If QA is all passing, feature is already complete. No build needed.",
                ),
            ));
        }

        // Gate 7
        let Some(acceptance_criteria) = non_empty(raw.acceptance_criteria.as_ref()) else {
            return Err(ConstitutionalError::protocol(
                G::AcceptanceCriteria,
                BuildPhilosophyViolation::new(
                    "REJECTED: No acceptance criteria provided",
                    "Builders require clear definition of \"done\"",
                    "Acceptance criteria defines when building is complete",
                    "Foreman must specify acceptance criteria (typically: \"100% QA passing\")",
                ),
            ));
        };

        // Gate 8
        let Some((metadata, task_id)) = raw
            .metadata
            .as_ref()
            .and_then(|m| non_empty(m.task_id.as_ref()).map(|t| (m, t.to_string())))
        else {
            return Err(ConstitutionalError::protocol(
                G::Metadata,
                BuildPhilosophyViolation::new(
                    "REJECTED: Invalid metadata",
                    "Metadata must include task_id, priority, and timeout_seconds",
                    "Metadata enables tracking and governance",
                    "Foreman must provide complete metadata with build request",
                ),
            ));
        };

        let passing = suite.passing_tests.unwrap_or(0);
        let total = suite.total_tests.unwrap_or(passing + failing);

        Ok(BuildRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            architecture: ArchitectureRef { reference, summary },
            qa_suite: QaSuite {
                name: suite.name.clone(),
                location: suite.location.clone(),
                current_status: QaSuiteStatus::Red,
                total_tests: total,
                passing_tests: passing,
                failing_tests: failing,
            },
            acceptance_criteria: acceptance_criteria.to_string(),
            organisation_id: raw.organisation_id.clone(),
            metadata: RequestMetadata {
                task_id,
                priority: metadata.priority.unwrap_or_default(),
                timeout_seconds: metadata.timeout_seconds,
            },
            files: raw.files.clone(),
        })
    }
}
