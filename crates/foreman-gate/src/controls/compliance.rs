use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::result::{ControlResult, EvidenceRef, Violation};
use async_trait::async_trait;
use foreman_constitutional::Severity;
use foreman_evidence::ControlName;

/// CS4: the snapshot is sealed, intact and has every bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceCompliance;

#[async_trait]
impl GovernanceControl for EvidenceCompliance {
    fn name(&self) -> ControlName {
        ControlName::Cs4
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let snapshot = context.snapshot();
        let mut violations = Vec::new();

        if !snapshot.is_immutable() {
            violations.push(Violation::new(
                "CS4_SNAPSHOT_MUTABLE",
                format!("Snapshot {} is not sealed", snapshot.snapshot_id()),
                Severity::Critical,
            ));
        }
        if let Err(e) = snapshot.verify() {
            violations.push(Violation::new("CS4_SNAPSHOT_INTEGRITY", e.to_string(), Severity::Critical));
        }
        let completeness = snapshot.completeness();
        for missing in completeness.missing_controls {
            violations.push(Violation::new(
                "CS4_EVIDENCE_INCOMPLETE",
                format!("No evidence bucket for {missing}"),
                Severity::High,
            ));
        }

        let evidence = vec![EvidenceRef {
            kind: foreman_evidence::EvidenceKind::Result,
            path: format!("snapshot:{}", snapshot.snapshot_id()),
            hash: Some(snapshot.hash()),
        }];
        ControlResult::from_violations(
            ControlName::Cs4,
            Severity::Critical,
            evidence,
            violations,
            "Evidence snapshot sealed and complete",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::context_with;

    #[tokio::test]
    async fn sealed_snapshot_passes() {
        let (_tmp, ctx) = context_with(&[("qa.log", "ok")]).await;
        let result = EvidenceCompliance.validate(&ctx).await;
        assert!(result.passed(), "{:?}", result.violations);
        assert_eq!(result.evidence[0].hash, Some(ctx.snapshot().hash()));
    }
}
