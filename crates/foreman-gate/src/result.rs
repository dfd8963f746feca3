//! Control and gate results

use chrono::{DateTime, Utc};
use foreman_constitutional::Severity;
use foreman_evidence::{ContentHash, ControlName, EvidenceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict of one control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlStatus {
    /// Control satisfied
    Pass,
    /// Control violated; merge is blocked
    Fail,
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// Pointer to a piece of evidence backing a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Evidence category
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    /// File path
    pub path: String,
    /// Content hash, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
}

impl EvidenceRef {
    /// Reference with the category derived from the path
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: EvidenceKind::from_path(std::path::Path::new(&path)),
            path,
            hash: None,
        }
    }

    /// Attach a content hash
    #[must_use]
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// One reason a control failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable code, e.g. `CS1_PROTECTED_FILE_MODIFIED`
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Evidence pointing at the problem
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceRef>,
}

impl Violation {
    /// Violation without evidence
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            evidence: Vec::new(),
        }
    }

    /// Attach one evidence reference
    #[must_use]
    pub fn with_evidence(mut self, evidence: EvidenceRef) -> Self {
        self.evidence.push(evidence);
        self
    }
}

/// Verdict of one control in one gate run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResult {
    /// Control that ran
    pub control_name: ControlName,
    /// PASS or FAIL
    pub status: ControlStatus,
    /// Severity of the control
    pub severity: Severity,
    /// Evidence consulted
    pub evidence: Vec<EvidenceRef>,
    /// Violations found; empty on PASS
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    /// Summary line
    pub message: String,
    /// When the control finished
    pub timestamp: DateTime<Utc>,
}

impl ControlResult {
    /// PASS when `violations` is empty, FAIL otherwise
    ///
    /// The summary reads `"<control> validation passed: <detail>"` or
    /// `"<control> validation failed: N violation(s) detected"`.
    #[must_use]
    pub fn from_violations(
        control: ControlName,
        severity: Severity,
        evidence: Vec<EvidenceRef>,
        violations: Vec<Violation>,
        pass_detail: &str,
    ) -> Self {
        let (status, message) = if violations.is_empty() {
            (ControlStatus::Pass, format!("{control} validation passed: {pass_detail}"))
        } else {
            (
                ControlStatus::Fail,
                format!("{control} validation failed: {} violation(s) detected", violations.len()),
            )
        };
        Self {
            control_name: control,
            status,
            severity,
            evidence,
            violations,
            message,
            timestamp: Utc::now(),
        }
    }

    /// True on PASS
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ControlStatus::Pass
    }
}

/// Outcome of one gate run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    /// PR under validation
    pub pr_number: u64,
    /// Commit under validation
    pub commit_sha: String,
    /// Snapshot the run was bound to
    pub snapshot_id: String,
    /// True when every control ran and passed
    pub passed: bool,
    /// Results of the controls that actually ran, in order
    pub controls: Vec<ControlResult>,
    /// Violations across every executed control
    pub violations: Vec<Violation>,
    /// Merge decision
    pub merge_allowed: bool,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
}

impl GateResult {
    /// Names of executed controls, in order
    #[must_use]
    pub fn executed(&self) -> Vec<ControlName> {
        self.controls.iter().map(|c| c.control_name).collect()
    }

    /// The control that stopped the run, if any
    #[must_use]
    pub fn blocking_control(&self) -> Option<&ControlResult> {
        self.controls.iter().find(|c| !c.passed())
    }

    /// Markdown report of this run
    #[must_use]
    pub fn report_markdown(&self) -> String {
        crate::report::render_markdown(self)
    }
}
