//! Build request types
//!
//! [`RawBuildRequest`] mirrors the wire JSON with every field optional so
//! that malformed requests can be rejected with a precise gate. A
//! [`BuildRequest`] is only produced by
//! [`ProtocolValidator::validate`](crate::ProtocolValidator::validate).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version accepted by builders
pub const PROTOCOL_VERSION: &str = "1.1";
/// The only accepted instruction
pub const BUILD_INSTRUCTION: &str = "Build to Green";

/// QA suite status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QaSuiteStatus {
    /// At least one test failing
    Red,
    /// All tests passing
    Green,
    /// Not yet run, or unrecognised
    #[serde(other)]
    Unknown,
}

impl fmt::Display for QaSuiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low
    Low,
    /// Normal
    #[default]
    Normal,
    /// High
    High,
    /// Critical
    Critical,
}

/// Wire form of the architecture reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArchitecture {
    /// Location of the architecture document
    #[serde(default)]
    pub reference: Option<String>,
    /// Optional summary
    #[serde(default)]
    pub summary: Option<String>,
}

/// Wire form of the QA suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQaSuite {
    /// Suite name
    #[serde(default)]
    pub name: Option<String>,
    /// Suite location
    #[serde(default)]
    pub location: Option<String>,
    /// Current status
    #[serde(default)]
    pub current_status: Option<QaSuiteStatus>,
    /// Total test count
    #[serde(default)]
    pub total_tests: Option<u64>,
    /// Passing test count
    #[serde(default)]
    pub passing_tests: Option<u64>,
    /// Failing test count
    #[serde(default)]
    pub failing_tests: Option<u64>,
}

/// Wire form of request metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    /// Task id
    #[serde(default)]
    pub task_id: Option<String>,
    /// Priority
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Advisory timeout; carried, not enforced
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Unvalidated build request as received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBuildRequest {
    /// Protocol version
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Instruction literal
    #[serde(default)]
    pub instruction: Option<String>,
    /// Architecture reference
    #[serde(default)]
    pub architecture: Option<RawArchitecture>,
    /// QA suite
    #[serde(default)]
    pub qa_suite: Option<RawQaSuite>,
    /// Acceptance criteria
    #[serde(default)]
    pub acceptance_criteria: Option<String>,
    /// Owning organisation
    #[serde(default, rename = "organisationId")]
    pub organisation_id: Option<String>,
    /// Metadata
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
    /// Files the build intends to touch
    #[serde(default)]
    pub files: Vec<String>,
}

/// Validated architecture reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureRef {
    /// Location of the architecture document
    pub reference: String,
    /// Optional summary
    pub summary: Option<String>,
}

/// Validated QA suite snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaSuite {
    /// Suite name
    pub name: Option<String>,
    /// Suite location
    pub location: Option<String>,
    /// Always [`QaSuiteStatus::Red`] for an accepted request
    pub current_status: QaSuiteStatus,
    /// Total tests
    pub total_tests: u64,
    /// Passing tests
    pub passing_tests: u64,
    /// Failing tests, always positive
    pub failing_tests: u64,
}

/// Validated request metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Task id
    pub task_id: String,
    /// Priority
    pub priority: Priority,
    /// Advisory timeout
    pub timeout_seconds: Option<u64>,
}

/// A build request that passed every protocol gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
    pub(crate) protocol_version: String,
    pub(crate) architecture: ArchitectureRef,
    pub(crate) qa_suite: QaSuite,
    pub(crate) acceptance_criteria: String,
    pub(crate) organisation_id: Option<String>,
    pub(crate) metadata: RequestMetadata,
    pub(crate) files: Vec<String>,
}

impl BuildRequest {
    /// Protocol version (always `1.1`)
    #[inline]
    #[must_use]
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Instruction (always `Build to Green`)
    #[inline]
    #[must_use]
    pub fn instruction(&self) -> &'static str {
        BUILD_INSTRUCTION
    }

    /// Architecture reference
    #[inline]
    #[must_use]
    pub fn architecture(&self) -> &ArchitectureRef {
        &self.architecture
    }

    /// QA suite at request time
    #[inline]
    #[must_use]
    pub fn qa_suite(&self) -> &QaSuite {
        &self.qa_suite
    }

    /// Acceptance criteria
    #[inline]
    #[must_use]
    pub fn acceptance_criteria(&self) -> &str {
        &self.acceptance_criteria
    }

    /// Owning organisation
    #[inline]
    #[must_use]
    pub fn organisation_id(&self) -> Option<&str> {
        self.organisation_id.as_deref()
    }

    /// Metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    /// Task id
    #[inline]
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.metadata.task_id
    }

    /// Files in scope
    #[inline]
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_string_maps_to_unknown() {
        let suite: RawQaSuite = serde_json::from_str(r#"{"current_status":"PURPLE"}"#).unwrap();
        assert_eq!(suite.current_status, Some(QaSuiteStatus::Unknown));
    }

    #[test]
    fn empty_object_parses() {
        let raw: RawBuildRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(raw, RawBuildRequest::default());
    }

    #[test]
    fn organisation_id_camel_case() {
        let raw: RawBuildRequest = serde_json::from_str(r#"{"organisationId":"org-1"}"#).unwrap();
        assert_eq!(raw.organisation_id.as_deref(), Some("org-1"));
    }
}
