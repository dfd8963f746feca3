//! Filename-keyword routing of evidence files into control buckets

use crate::control::ControlName;
use serde::{Deserialize, Serialize};

/// What to do with a file no rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "control")]
pub enum UnmatchedEvidence {
    /// Put it in the given bucket
    Route(ControlName),
    /// Fail snapshot construction
    Reject,
    /// Leave it out of the snapshot
    Ignore,
}

impl Default for UnmatchedEvidence {
    fn default() -> Self {
        Self::Route(ControlName::Qiel)
    }
}

/// One keyword rule; first matching rule wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Lowercase substrings checked against the lowercased file name
    pub keywords: Vec<String>,
    /// Destination bucket
    pub control: ControlName,
}

impl ClassificationRule {
    /// Rule from keyword list
    pub fn new<I, S>(control: ControlName, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
            control,
        }
    }

    fn matches(&self, file_name: &str) -> bool {
        self.keywords.iter().any(|k| file_name.contains(k.as_str()))
    }
}

/// Outcome of classifying one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Goes into this bucket
    Bucket(ControlName),
    /// Excluded by an ignore policy
    Skip,
    /// Rejected by a reject policy
    Reject,
}

/// Ordered keyword rules plus an unmatched policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceClassifier {
    rules: Vec<ClassificationRule>,
    #[serde(default)]
    unmatched: UnmatchedEvidence,
}

impl Default for EvidenceClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                ClassificationRule::new(ControlName::Qiel, ["qiel", "qa", "test"]),
                ClassificationRule::new(ControlName::Cs1, ["cs1", "constitutional"]),
                ClassificationRule::new(ControlName::BuildPhilosophy, ["build", "philosophy"]),
            ],
            unmatched: UnmatchedEvidence::default(),
        }
    }
}

impl EvidenceClassifier {
    /// Classifier with explicit rules
    #[must_use]
    pub fn new(rules: Vec<ClassificationRule>, unmatched: UnmatchedEvidence) -> Self {
        Self { rules, unmatched }
    }

    /// Replace the unmatched policy
    #[inline]
    #[must_use]
    pub fn with_unmatched(mut self, unmatched: UnmatchedEvidence) -> Self {
        self.unmatched = unmatched;
        self
    }

    /// Append a rule after the existing ones
    #[inline]
    #[must_use]
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Active unmatched policy
    #[inline]
    #[must_use]
    pub fn unmatched(&self) -> UnmatchedEvidence {
        self.unmatched
    }

    /// Classify by file name (not full path)
    #[must_use]
    pub fn classify(&self, file_name: &str) -> Classification {
        let lowered = file_name.to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| r.matches(&lowered)) {
            return Classification::Bucket(rule.control);
        }
        match self.unmatched {
            UnmatchedEvidence::Route(control) => Classification::Bucket(control),
            UnmatchedEvidence::Ignore => Classification::Skip,
            UnmatchedEvidence::Reject => Classification::Reject,
        }
    }
}
