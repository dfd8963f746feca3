//! Property tests for the protocol gates and constitutional checks

use foreman_constitutional::{
    enforce_quality_supremacy, ProtocolGate, ProtocolValidator, QaResult, QaSuiteStatus, RawArchitecture,
    RawBuildRequest, RawMetadata, RawQaSuite, SecretScanner,
};
use proptest::prelude::*;

fn valid_request() -> RawBuildRequest {
    RawBuildRequest {
        protocol_version: Some("1.1".into()),
        instruction: Some("Build to Green".into()),
        architecture: Some(RawArchitecture {
            reference: Some("foreman/architecture/feature.md".into()),
            summary: Some("feature".into()),
        }),
        qa_suite: Some(RawQaSuite {
            name: Some("feature".into()),
            location: Some("tests/feature".into()),
            current_status: Some(QaSuiteStatus::Red),
            total_tests: Some(20),
            passing_tests: Some(15),
            failing_tests: Some(5),
        }),
        acceptance_criteria: Some("100% QA passing".into()),
        organisation_id: Some("org".into()),
        metadata: Some(RawMetadata {
            task_id: Some("task-42".into()),
            priority: None,
            timeout_seconds: Some(3600),
        }),
        files: vec!["src/feature.rs".into()],
    }
}

/// Break the gates selected by `mask`; bit k breaks gate k+1
fn break_gates(mask: u8) -> RawBuildRequest {
    let mut raw = valid_request();
    if mask & 1 != 0 {
        raw.protocol_version = Some("1.0".into());
    }
    if mask & 2 != 0 {
        raw.instruction = Some("Just build it".into());
    }
    if mask & 4 != 0 {
        raw.architecture = None;
    }
    if mask & 8 != 0 {
        raw.qa_suite = None;
    }
    if mask & 16 != 0 {
        if let Some(suite) = raw.qa_suite.as_mut() {
            suite.current_status = Some(QaSuiteStatus::Green);
        }
    }
    if mask & 32 != 0 {
        if let Some(suite) = raw.qa_suite.as_mut() {
            suite.failing_tests = Some(0);
        }
    }
    if mask & 64 != 0 {
        raw.acceptance_criteria = None;
    }
    if mask & 128 != 0 {
        raw.metadata = None;
    }
    raw
}

/// First gate that actually fails given the mask (gate 4 removal hides 5 and 6)
fn expected_gate(mask: u8) -> Option<ProtocolGate> {
    (0..8u8).find(|bit| mask & (1 << bit) != 0).map(|bit| ProtocolGate::ALL[bit as usize])
}

proptest! {
    #[test]
    fn first_failing_gate_is_reported(mask in any::<u8>()) {
        let result = ProtocolValidator::new().validate(&break_gates(mask));
        match expected_gate(mask) {
            None => prop_assert!(result.is_ok()),
            Some(gate) => {
                let err = result.unwrap_err();
                prop_assert_eq!(err.gate(), Some(gate));
                prop_assert!(!err.violation().unwrap().details.action.is_empty());
            }
        }
    }

    #[test]
    fn any_failing_test_blocks(total in 1u64..10_000, failing in 1u64..10_000) {
        let failing = failing.min(total);
        let qa = QaResult::new(total, total - failing, failing);
        let decision = enforce_quality_supremacy(&qa);
        prop_assert!(!decision.build_allowed);
        prop_assert!(decision.reason.unwrap().ends_with("TOTAL FAILURE"));
    }

    #[test]
    fn comment_lines_never_flag_generic_credentials(value in "[A-Za-z0-9]{20,40}") {
        let code = format!("// api_key = \"{value}\"");
        prop_assert!(!SecretScanner::default().scan(&code).has_secrets());
    }

    #[test]
    fn literal_credentials_always_flag(value in "[A-Za-z0-9]{20,40}") {
        let code = format!("let api_key = \"{value}\";");
        prop_assert!(SecretScanner::default().scan(&code).has_secrets());
    }
}

#[test]
fn protected_path_rejection_keeps_violation_shape() {
    let mut raw = valid_request();
    raw.files = vec!["src/ok.rs".into(), "foreman/constitution/law.md".into()];
    let err = ProtocolValidator::new().accept(&raw).unwrap_err();
    let violation = err.violation().unwrap();
    assert_eq!(violation.message, "REJECTED: Protected path modification");
    assert!(violation.details.reason.contains("foreman/constitution/law.md"));
}
