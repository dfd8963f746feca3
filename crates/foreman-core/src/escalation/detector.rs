//! Escalation heuristics
//!
//! Four independent checks, each returning a [`Verdict`] with readable
//! reasons. They are advisory: a miss is acceptable, since escalation is a
//! safety net on top of the QA gate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static API_ENDPOINT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/api/[^\s]+").ok());

/// Thresholds and keyword lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// QA attempts with failures before the suite is suspect
    pub max_attempts: u32,
    /// Consecutive failed iterations before escalating
    pub max_consecutive_failures: usize,
    /// Iterations with an unchanged passing count that count as no progress
    pub no_progress_window: usize,
    /// Error text that signals an under-specified architecture
    pub ambiguity_keywords: Vec<String>,
    /// Terms checked for positive and negated assertions across failures
    pub contradiction_terms: Vec<String>,
    /// Word marking a negated assertion
    pub negation_marker: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_consecutive_failures: 10,
            no_progress_window: 5,
            ambiguity_keywords: ["cannot determine", "ambiguous", "unclear", "unknown", "missing specification"]
                .into_iter()
                .map(String::from)
                .collect(),
            contradiction_terms: vec!["visible".into()],
            negation_marker: "not".into(),
        }
    }
}

/// Outcome of one heuristic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// True if the builder should escalate
    pub escalate: bool,
    /// Why, in order found
    pub reasons: Vec<String>,
}

impl Verdict {
    fn clear() -> Self {
        Self::default()
    }

    fn escalate(reason: impl Into<String>) -> Self {
        Self::from_reasons(vec![reason.into()])
    }

    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            escalate: !reasons.is_empty(),
            reasons,
        }
    }

    /// First reason, if escalating
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reasons.first().map(String::as_str)
    }
}

/// One failing test from a QA run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    /// Test name
    #[serde(default)]
    pub test: String,
    /// Assertion message
    #[serde(default)]
    pub message: String,
}

/// What a test asserts, as far as the detector cares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExpectation {
    /// Free-text expectation, e.g. "endpoint /api/users returns 200"
    #[serde(default)]
    pub expects: Option<String>,
    /// Assertion text, e.g. "banner is not visible"
    #[serde(default)]
    pub assertion: Option<String>,
}

/// Parts of an architecture document the detector inspects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureDoc {
    /// Declared API endpoints
    #[serde(default)]
    pub endpoints: Option<Vec<String>>,
    /// Visibility rule, e.g. "always visible"
    #[serde(default)]
    pub visibility: Option<String>,
    /// Component name
    #[serde(default)]
    pub component: Option<String>,
    /// Component props
    #[serde(default)]
    pub props: Option<Vec<String>>,
    /// Prop name to type
    #[serde(default)]
    pub prop_types: Option<BTreeMap<String, String>>,
    /// Data fields
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Field name to type
    #[serde(default)]
    pub field_types: Option<BTreeMap<String, String>>,
}

/// Passing count after one failed iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Iteration number
    pub iteration: u32,
    /// Passing tests
    pub passing: u64,
    /// Failing tests
    pub failing: u64,
}

/// Runs the escalation heuristics
#[derive(Debug, Clone, Default)]
pub struct EscalationDetector {
    config: DetectorConfig,
}

impl EscalationDetector {
    /// Detector with custom thresholds
    #[inline]
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// QA suite that looks impossible to satisfy
    #[must_use]
    pub fn detect_impossible_qa(&self, failing: u64, failures: &[TestFailure], attempts: u32) -> Verdict {
        if attempts >= self.config.max_attempts && failing > 0 {
            return Verdict::escalate(format!(
                "Same test(s) failing after {} attempts - likely architecture or test issue",
                self.config.max_attempts
            ));
        }

        if failures.len() >= 2 {
            let negation = self.config.negation_marker.to_lowercase();
            let messages: Vec<String> = failures.iter().map(|f| f.message.to_lowercase()).collect();
            for term in &self.config.contradiction_terms {
                let term = term.to_lowercase();
                let positive = messages.iter().any(|m| m.contains(&term) && !m.contains(&negation));
                let negative = messages.iter().any(|m| m.contains(&term) && m.contains(&negation));
                if positive && negative {
                    return Verdict::escalate(format!(
                        "Tests contradict each other ({term} vs {negation} {term} requirements)"
                    ));
                }
            }
        }

        Verdict::clear()
    }

    /// Tests that assert behavior the architecture does not define
    #[must_use]
    pub fn detect_contradiction(&self, architecture: &ArchitectureDoc, tests: &[TestExpectation]) -> Verdict {
        let mut reasons = Vec::new();

        if let (Some(endpoints), Some(pattern)) = (&architecture.endpoints, API_ENDPOINT.as_ref()) {
            for expects in tests.iter().filter_map(|t| t.expects.as_deref()) {
                if !expects.contains("endpoint") {
                    continue;
                }
                if let Some(endpoint) = pattern.find(expects).map(|m| m.as_str()) {
                    if !endpoints.iter().any(|e| e == endpoint) {
                        reasons.push(format!("Test expects {endpoint} but not in architecture"));
                    }
                }
            }
        }

        if architecture.visibility.as_deref() == Some("always visible") {
            for assertion in tests.iter().filter_map(|t| t.assertion.as_deref()) {
                if assertion.to_lowercase().contains("not visible") {
                    reasons.push("Architecture says always visible but test expects not visible".into());
                }
            }
        }

        Verdict::from_reasons(reasons)
    }

    /// Escalate on too many failures, no progress or regression
    ///
    /// `history` holds the consecutive failed iterations, oldest first.
    #[must_use]
    pub fn should_escalate_after_retries(&self, history: &[IterationRecord]) -> Verdict {
        let limit = self.config.max_consecutive_failures;
        if history.len() >= limit {
            return Verdict::escalate(format!("{limit}+ consecutive failures without resolution"));
        }

        let window = self.config.no_progress_window;
        if window > 0 && history.len() >= window {
            let recent = &history[history.len() - window..];
            if recent.iter().all(|r| r.passing == recent[0].passing) {
                return Verdict::escalate(format!("No progress in last {window} iterations"));
            }
        }

        if let [.., prev, last] = history {
            if last.passing < prev.passing {
                return Verdict::escalate("Regression detected - passing tests decreased");
            }
        }

        Verdict::clear()
    }

    /// Error text or architecture gaps that point at missing specification
    #[must_use]
    pub fn detect_ambiguity(&self, error_message: Option<&str>, architecture: &ArchitectureDoc) -> Verdict {
        let mut reasons = Vec::new();

        if let Some(message) = error_message.map(str::to_lowercase) {
            if self
                .config
                .ambiguity_keywords
                .iter()
                .any(|k| message.contains(&k.to_lowercase()))
            {
                reasons.push("Error indicates ambiguity or missing specification".to_string());
            }
        }

        if architecture.component.is_some() && architecture.props.is_none() {
            reasons.push("Component defined but props not specified".into());
        }
        if architecture.props.is_some() && architecture.prop_types.is_none() {
            reasons.push("Props defined but prop types not specified".into());
        }
        if architecture.fields.is_some() && architecture.prop_types.is_none() && architecture.field_types.is_none() {
            reasons.push("Fields defined but types not specified".into());
        }

        Verdict::from_reasons(reasons)
    }
}
