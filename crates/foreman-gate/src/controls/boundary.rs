use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::result::{ControlResult, EvidenceRef, Violation};
use async_trait::async_trait;
use foreman_constitutional::Severity;
use foreman_evidence::{verify_snapshot_files, ControlName};

/// CS6: every evidence file still hashes to what the snapshot recorded
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionBoundary;

#[async_trait]
impl GovernanceControl for ExecutionBoundary {
    fn name(&self) -> ControlName {
        ControlName::Cs6
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let checks = verify_snapshot_files(context.snapshot()).await;
        let mut evidence = Vec::with_capacity(checks.len());
        let mut violations = Vec::new();

        for check in checks {
            let reference = EvidenceRef::path(&check.path).with_hash(check.expected);
            if !check.intact {
                tracing::error!(path = %check.path, "evidence file altered after snapshot");
                violations.push(
                    Violation::new(
                        "CS6_EVIDENCE_ALTERED",
                        format!("Evidence file changed or removed since capture: {}", check.path),
                        Severity::Critical,
                    )
                    .with_evidence(reference.clone()),
                );
            }
            evidence.push(reference);
        }

        ControlResult::from_violations(
            ControlName::Cs6,
            Severity::Critical,
            evidence,
            violations,
            "Evidence unchanged since capture",
        )
    }
}
