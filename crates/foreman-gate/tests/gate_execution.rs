//! Governance gate behaviour end to end over real evidence trees

use async_trait::async_trait;
use foreman_constitutional::{AuditLogger, MemorySink, QaResult};
use foreman_core::ForemanConfig;
use foreman_evidence::{ControlName, EvidenceSnapshot};
use foreman_gate::prelude::*;
use foreman_gate::{ArchitectureChange, ControlStatus, Incident};
use foreman_test_utils::{init_tracing, sample_snapshot};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

mockall::mock! {
    Control {}

    #[async_trait]
    impl GovernanceControl for Control {
        fn name(&self) -> ControlName;
        async fn validate(&self, context: &GateContext) -> ControlResult;
    }
}

/// Mock in `slot` that must never be called
fn never_runs(slot: ControlName) -> MockControl {
    let mut control = MockControl::new();
    control.expect_name().return_const(slot);
    control.expect_validate().never();
    control
}

async fn passing_context(root: &std::path::Path) -> GateContext {
    let snapshot = sample_snapshot(root, 123).await.unwrap();
    GateContext::new(snapshot)
        .with_qa(QaResult::all_green(10))
        .with_changed_file("src/login.rs", "pub fn login() {}\n")
}

#[tokio::test]
async fn all_controls_pass_and_merge_is_allowed() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path()).await;

    let result = GateExecutor::new().execute(&context).await.unwrap();

    assert_eq!(result.executed(), ControlName::ALL.to_vec());
    assert!(result.passed);
    assert!(result.merge_allowed);
    assert!(result.violations.is_empty());
    assert!(result.report_markdown().contains("- **Merge allowed:** yes"));
}

#[tokio::test]
async fn cs2_failure_stops_the_run() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path())
        .await
        .with_architecture_change(ArchitectureChange::pending("replace session store"));

    let mut executor = GateExecutor::new();
    for slot in &ControlName::ALL[3..] {
        executor = executor.with_control(never_runs(*slot));
    }
    let result = executor.execute(&context).await.unwrap();

    assert_eq!(result.executed(), vec![ControlName::Qiel, ControlName::Cs1, ControlName::Cs2]);
    assert_eq!(result.controls[0].status, ControlStatus::Pass);
    assert_eq!(result.controls[1].status, ControlStatus::Pass);
    assert_eq!(result.controls[2].status, ControlStatus::Fail);
    assert!(!result.passed);
    assert!(!result.merge_allowed);
    assert_eq!(result.violations[0].code, "CS2_ARCHITECTURE_UNAPPROVED");
    assert_eq!(result.blocking_control().map(|c| c.control_name), Some(ControlName::Cs2));
}

#[tokio::test]
async fn qiel_failure_runs_only_qiel() {
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path()).await.with_qa(QaResult::new(10, 9, 1));

    let result = GateExecutor::new().execute(&context).await.unwrap();

    assert_eq!(result.executed(), vec![ControlName::Qiel]);
    assert!(!result.merge_allowed);
    let report = result.report_markdown();
    assert!(report.contains("| 2 | CS1 (Constitutional Integrity) | ⏭ SKIPPED | not run |"));
}

#[tokio::test]
async fn open_incident_blocks_at_cs3() {
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path()).await.with_incident(Incident {
        id: "inc-42".into(),
        pr_number: 123,
        summary: "checkout regression".into(),
        resolved: false,
    });

    let result = GateExecutor::new().execute(&context).await.unwrap();

    assert_eq!(result.executed().last(), Some(&ControlName::Cs3));
    assert!(!result.merge_allowed);
}

#[tokio::test]
async fn altered_evidence_blocks_at_cs6() {
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path()).await;
    tokio::fs::write(tmp.path().join("evidence/red-qa.log"), "10/10 passing\n")
        .await
        .unwrap();

    let result = GateExecutor::new().execute(&context).await.unwrap();

    assert_eq!(result.executed().len(), 7);
    assert_eq!(result.violations[0].code, "CS6_EVIDENCE_ALTERED");
}

#[tokio::test]
async fn tampered_snapshot_is_rejected_before_any_control() {
    let tmp = tempfile::tempdir().unwrap();
    let snapshot = sample_snapshot(tmp.path(), 123).await.unwrap();
    let mut json = serde_json::to_value(&snapshot).unwrap();
    json["prNumber"] = serde_json::json!(999);
    let forged: EvidenceSnapshot = serde_json::from_value(json).unwrap();

    let mut executor = GateExecutor::new();
    for slot in ControlName::ALL {
        executor = executor.with_control(never_runs(slot));
    }
    let err = executor
        .execute(&GateContext::new(forged).with_qa(QaResult::all_green(10)))
        .await
        .unwrap_err();

    assert!(err.is_tampering(), "{err}");
}

#[derive(Debug)]
struct SlowControl;

#[async_trait]
impl GovernanceControl for SlowControl {
    fn name(&self) -> ControlName {
        ControlName::Cs1
    }

    async fn validate(&self, _context: &GateContext) -> ControlResult {
        tokio::time::sleep(Duration::from_secs(30)).await;
        unreachable!("deadline should fire first")
    }
}

#[tokio::test]
async fn deadline_is_enforced() {
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path()).await;

    let err = GateExecutor::new()
        .with_control(SlowControl)
        .with_timeout(Duration::from_millis(100))
        .execute(&context)
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::DeadlineExceeded { completed: 1, .. }), "{err}");
}

#[tokio::test]
async fn config_sets_deadline() {
    let config = ForemanConfig::default().with_gate_timeout_secs(5);
    assert_eq!(GateExecutor::from_config(&config).timeout(), Duration::from_secs(5));
    assert_eq!(GateExecutor::new().timeout(), Duration::from_secs(60));
}

#[tokio::test]
async fn incomplete_control_set_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path()).await;

    let err = GateExecutor::new()
        .with_controls(ControlSet::empty())
        .execute(&context)
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::MissingControl(ref m) if m.starts_with("QIEL, CS1")));
}

#[tokio::test]
async fn outcome_is_audited() {
    let tmp = tempfile::tempdir().unwrap();
    let context = passing_context(tmp.path())
        .await
        .with_architecture_change(ArchitectureChange::pending("new queue"));
    let sink = Arc::new(MemorySink::new());

    GateExecutor::new()
        .with_audit(AuditLogger::new(sink.clone()))
        .execute(&context)
        .await
        .unwrap();

    let events = sink.events_of_type("governance_gate_executed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metadata["blockedBy"], "CS2");
    assert_eq!(events[0].metadata["mergeAllowed"], false);
}
