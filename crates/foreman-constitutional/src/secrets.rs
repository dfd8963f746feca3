//! Hardcoded secret detection
//!
//! The scanner runs a list of [`SecretDetector`]s over source text. The
//! default list covers vendor key prefixes and credential assignments.
//! Assignment detectors skip comment lines and values that point at the
//! environment instead of embedding a literal.

use crate::error::ConstitutionalError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// One detected secret, already redacted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretFinding {
    /// Detector that fired
    pub detector: String,
    /// 1-based line number
    pub line: usize,
    /// Redacted preview, never the full secret
    pub preview: String,
}

/// Pluggable secret detector
pub trait SecretDetector: Debug + Send + Sync {
    /// Stable detector name
    fn name(&self) -> &str;

    /// All findings in `source`
    fn detect(&self, source: &str) -> Vec<SecretFinding>;
}

/// How much of a match may appear in the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preview {
    /// First `n` characters followed by `...`
    Prefix(usize),
    /// Label only
    Redacted,
}

const COMMENT_PREFIXES: [&str; 4] = ["//", "*", "/*", "#"];
const ENV_MARKERS: [&str; 6] = ["process.env", "env::var", "std::env", "os.environ", "getenv", "${"];

/// Regex-based detector
#[derive(Debug, Clone)]
pub struct PatternDetector {
    name: String,
    label: String,
    regex: Regex,
    preview: Preview,
    value_group: Option<usize>,
    exempt_indirection: bool,
}

impl PatternDetector {
    /// Detector reporting the whole match
    #[must_use]
    pub fn new(name: impl Into<String>, label: impl Into<String>, regex: Regex, preview: Preview) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            regex,
            preview,
            value_group: None,
            exempt_indirection: false,
        }
    }

    /// Preview from a capture group instead of the whole match
    #[inline]
    #[must_use]
    pub fn with_value_group(mut self, group: usize) -> Self {
        self.value_group = Some(group);
        self
    }

    /// Skip comment lines and environment indirection
    #[inline]
    #[must_use]
    pub fn exempting_indirection(mut self) -> Self {
        self.exempt_indirection = true;
        self
    }

    fn is_exempt(source: &str, start: usize, matched: &str) -> bool {
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let before = source[line_start..start].trim_start();
        if COMMENT_PREFIXES.iter().any(|p| before.starts_with(p)) {
            return true;
        }
        ENV_MARKERS.iter().any(|m| matched.contains(m))
    }

    fn render(&self, value: &str) -> String {
        match self.preview {
            Preview::Prefix(n) => {
                let head: String = value.chars().take(n).collect();
                format!("{}: {head}...", self.label)
            }
            Preview::Redacted => format!("{} (redacted)", self.label),
        }
    }
}

impl SecretDetector for PatternDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, source: &str) -> Vec<SecretFinding> {
        let mut findings = Vec::new();
        for caps in self.regex.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if self.exempt_indirection && Self::is_exempt(source, whole.start(), whole.as_str()) {
                continue;
            }
            let value = self
                .value_group
                .and_then(|g| caps.get(g))
                .unwrap_or(whole)
                .as_str();
            findings.push(SecretFinding {
                detector: self.name.clone(),
                line: source[..whole.start()].matches('\n').count() + 1,
                preview: self.render(value),
            });
        }
        findings
    }
}

static DEFAULT_DETECTORS: Lazy<Vec<PatternDetector>> = Lazy::new(|| {
    let specs: [(&str, &str, &str, Preview, Option<usize>, bool); 5] = [
        ("openai_key", "OpenAI API Key", r"sk-proj-[A-Za-z0-9_-]{48,}", Preview::Prefix(20), None, false),
        ("github_token", "GitHub Token", r"ghp_[A-Za-z0-9]{36,}", Preview::Prefix(15), None, false),
        ("aws_access_key", "AWS Access Key", r"AKIA[0-9A-Z]{16}", Preview::Prefix(8), None, false),
        (
            "aws_secret_key",
            "AWS Secret Access Key",
            r#"(?i)aws_secret_access_key\s*=\s*['"][A-Za-z0-9/+=]{40,}['"]"#,
            Preview::Redacted,
            None,
            true,
        ),
        (
            "generic_credential",
            "API Key/Secret",
            r#"(?i)(?:api[_-]?key|apikey|api[_-]?secret|secret|token)\s*[:=]\s*['"]([^'"]{20,})['"]"#,
            Preview::Prefix(10),
            Some(1),
            true,
        ),
    ];
    specs
        .into_iter()
        .filter_map(|(name, label, pattern, preview, group, exempt)| {
            let regex = Regex::new(pattern).ok()?;
            let mut detector = PatternDetector::new(name, label, regex, preview);
            if let Some(g) = group {
                detector = detector.with_value_group(g);
            }
            if exempt {
                detector = detector.exempting_indirection();
            }
            Some(detector)
        })
        .collect()
});

/// Result of scanning one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretScan {
    /// Findings across all detectors
    pub findings: Vec<SecretFinding>,
}

impl SecretScan {
    /// True if anything was found
    #[inline]
    #[must_use]
    pub fn has_secrets(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// Runs every registered detector
#[derive(Debug, Clone)]
pub struct SecretScanner {
    detectors: Vec<Arc<dyn SecretDetector>>,
}

impl Default for SecretScanner {
    fn default() -> Self {
        Self {
            detectors: DEFAULT_DETECTORS
                .iter()
                .cloned()
                .map(|d| Arc::new(d) as Arc<dyn SecretDetector>)
                .collect(),
        }
    }
}

impl SecretScanner {
    /// Scanner with no detectors
    #[must_use]
    pub fn empty() -> Self {
        Self { detectors: Vec::new() }
    }

    /// Register an additional detector
    #[must_use]
    pub fn with_detector(mut self, detector: impl SecretDetector + 'static) -> Self {
        self.detectors.push(Arc::new(detector));
        self
    }

    /// Names of registered detectors
    #[must_use]
    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Scan source text
    #[must_use]
    pub fn scan(&self, source: &str) -> SecretScan {
        SecretScan {
            findings: self.detectors.iter().flat_map(|d| d.detect(source)).collect(),
        }
    }

    /// Scan and fail on any finding
    ///
    /// # Errors
    /// [`ConstitutionalError::SecretsDetected`] with redacted findings
    pub fn check(&self, source: &str) -> Result<(), ConstitutionalError> {
        let scan = self.scan(source);
        if scan.has_secrets() {
            tracing::warn!(count = scan.findings.len(), "hardcoded secrets detected");
            return Err(ConstitutionalError::SecretsDetected {
                findings: scan.findings,
            });
        }
        Ok(())
    }
}
