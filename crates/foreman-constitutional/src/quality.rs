//! Quality supremacy: 100% passing or nothing
//!
//! 99% passing is total failure. The first shortfall found is reported.

use crate::error::ConstitutionalError;
use crate::request::QaSuiteStatus;
use crate::violation::BuildPhilosophyViolation;
use serde::{Deserialize, Serialize};

/// Summary of one QA run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaResult {
    /// Total tests
    pub total: u64,
    /// Passing tests
    pub passing: u64,
    /// Failing tests
    pub failing: u64,
    /// Lint errors
    #[serde(default)]
    pub lint_errors: u64,
    /// Build errors
    #[serde(default)]
    pub build_errors: u64,
    /// Warnings
    #[serde(default)]
    pub warnings: u64,
    /// QA harness errors
    #[serde(default)]
    pub errors: u64,
    /// Skipped tests
    #[serde(default)]
    pub skipped: u64,
    /// Wall-clock duration of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl QaResult {
    /// Counts only; all error counters zero
    #[must_use]
    pub fn new(total: u64, passing: u64, failing: u64) -> Self {
        Self {
            total,
            passing,
            failing,
            ..Self::default()
        }
    }

    /// Every test passing
    #[must_use]
    pub fn all_green(total: u64) -> Self {
        Self::new(total, total, 0)
    }

    /// Status implied by the counts
    #[must_use]
    pub fn status(&self) -> QaSuiteStatus {
        if self.total > 0 && self.failing == 0 && self.passing == self.total {
            QaSuiteStatus::Green
        } else if self.failing > 0 {
            QaSuiteStatus::Red
        } else {
            QaSuiteStatus::Unknown
        }
    }
}

/// Outcome of the quality supremacy check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceDecision {
    /// True only at 100% green with zero errors
    pub build_allowed: bool,
    /// First shortfall, when blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GovernanceDecision {
    fn allow() -> Self {
        Self {
            build_allowed: true,
            reason: None,
        }
    }

    fn block(reason: String) -> Self {
        Self {
            build_allowed: false,
            reason: Some(reason),
        }
    }

    /// Convert to a result
    ///
    /// # Errors
    /// [`ConstitutionalError::QualitySupremacy`] when blocked
    pub fn into_result(self) -> Result<(), ConstitutionalError> {
        match self.reason {
            Some(reason) if !self.build_allowed => Err(ConstitutionalError::QualitySupremacy { reason }),
            _ => Ok(()),
        }
    }
}

/// Check failing, lint, build and QA errors, then exact 100% passing
#[must_use]
pub fn enforce_quality_supremacy(qa: &QaResult) -> GovernanceDecision {
    if qa.failing > 0 {
        return GovernanceDecision::block(format!(
            "QA has {} failing test(s). 100% passing required. {}/{} = TOTAL FAILURE",
            qa.failing, qa.passing, qa.total
        ));
    }
    if qa.lint_errors > 0 {
        return GovernanceDecision::block(format!(
            "Lint errors exist: {} error(s). Zero errors required.",
            qa.lint_errors
        ));
    }
    if qa.build_errors > 0 {
        return GovernanceDecision::block(format!(
            "Build errors exist: {} error(s). Zero errors required.",
            qa.build_errors
        ));
    }
    if qa.errors > 0 {
        return GovernanceDecision::block(format!(
            "QA has {} error(s). Zero errors required.",
            qa.errors
        ));
    }
    if qa.passing != qa.total {
        return GovernanceDecision::block(format!(
            "QA is not 100% passing: {}/{}. 100% required.",
            qa.passing, qa.total
        ));
    }
    GovernanceDecision::allow()
}

/// Check a build went RED to GREEN with nothing left failing
///
/// # Errors
/// [`ConstitutionalError::QaTransition`] with the specific shortfall
pub fn validate_qa_transition(
    pre: QaSuiteStatus,
    post: QaSuiteStatus,
    post_failing: u64,
) -> Result<(), ConstitutionalError> {
    let violation = if pre != QaSuiteStatus::Red {
        Some(BuildPhilosophyViolation::new(
            "REJECTED: Invalid QA transition",
            format!("Build must start with RED QA, started with: {pre}"),
            "Red QA is required before building",
            "Ensure QA is RED before starting build",
        ))
    } else if post != QaSuiteStatus::Green {
        Some(BuildPhilosophyViolation::new(
            "REJECTED: Build not complete",
            format!("Build must end with GREEN QA, ended with: {post}"),
            "100% QA passing is required for completion",
            "Continue building until all tests pass",
        ))
    } else if post_failing > 0 {
        Some(BuildPhilosophyViolation::new(
            "REJECTED: QA still has failures",
            format!("QA has {post_failing} failing tests"),
            "100% QA passing is absolute",
            "Continue building until all tests pass",
        ))
    } else {
        None
    };

    match violation {
        Some(violation) => Err(ConstitutionalError::QaTransition {
            violation: Box::new(violation),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninety_nine_percent_is_total_failure() {
        let decision = enforce_quality_supremacy(&QaResult::new(303, 301, 2));
        assert!(!decision.build_allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("QA has 2 failing test(s). 100% passing required. 301/303 = TOTAL FAILURE")
        );
    }

    #[test]
    fn lint_errors_block() {
        let qa = QaResult {
            lint_errors: 3,
            ..QaResult::all_green(10)
        };
        assert_eq!(
            enforce_quality_supremacy(&qa).reason.as_deref(),
            Some("Lint errors exist: 3 error(s). Zero errors required.")
        );
    }

    #[test]
    fn checks_run_in_order() {
        let qa = QaResult {
            build_errors: 1,
            errors: 1,
            ..QaResult::all_green(10)
        };
        assert!(enforce_quality_supremacy(&qa).reason.unwrap().starts_with("Build errors"));

        let qa = QaResult {
            errors: 4,
            ..QaResult::all_green(10)
        };
        assert!(enforce_quality_supremacy(&qa).reason.unwrap().starts_with("QA has 4 error(s)"));
    }

    #[test]
    fn unaccounted_tests_block() {
        let decision = enforce_quality_supremacy(&QaResult::new(10, 9, 0));
        assert_eq!(
            decision.reason.as_deref(),
            Some("QA is not 100% passing: 9/10. 100% required.")
        );
    }

    #[test]
    fn all_green_allowed() {
        let decision = enforce_quality_supremacy(&QaResult::all_green(303));
        assert!(decision.build_allowed);
        assert!(decision.into_result().is_ok());
    }

    #[test]
    fn transition_rules() {
        use QaSuiteStatus::{Green, Red, Unknown};
        assert!(validate_qa_transition(Red, Green, 0).is_ok());

        let err = validate_qa_transition(Green, Green, 0).unwrap_err();
        assert_eq!(err.violation().unwrap().message, "REJECTED: Invalid QA transition");

        let err = validate_qa_transition(Red, Unknown, 0).unwrap_err();
        assert_eq!(err.violation().unwrap().message, "REJECTED: Build not complete");

        let err = validate_qa_transition(Red, Green, 1).unwrap_err();
        assert_eq!(err.violation().unwrap().details.reason, "QA has 1 failing tests");
    }

    #[test]
    fn status_from_counts() {
        assert_eq!(QaResult::all_green(5).status(), QaSuiteStatus::Green);
        assert_eq!(QaResult::new(5, 4, 1).status(), QaSuiteStatus::Red);
        assert_eq!(QaResult::new(0, 0, 0).status(), QaSuiteStatus::Unknown);
    }
}
