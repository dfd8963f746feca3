use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::controls::bucket_refs;
use crate::result::{ControlResult, Violation};
use async_trait::async_trait;
use foreman_constitutional::{enforce_quality_supremacy, Severity};
use foreman_evidence::ControlName;

/// QIEL: the live QA run must be 100% green with zero errors
#[derive(Debug, Clone, Copy, Default)]
pub struct QaIntegrity;

#[async_trait]
impl GovernanceControl for QaIntegrity {
    fn name(&self) -> ControlName {
        ControlName::Qiel
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let qa = context.qa();
        let mut violations = Vec::new();

        if qa.total == 0 {
            violations.push(Violation::new(
                "QIEL_NO_QA_RUN",
                "No QA results recorded for this PR",
                Severity::Critical,
            ));
        } else if let Some(reason) = enforce_quality_supremacy(qa).reason {
            violations.push(Violation::new("QIEL_QUALITY_SUPREMACY", reason, Severity::Critical));
        }

        ControlResult::from_violations(
            ControlName::Qiel,
            Severity::Critical,
            bucket_refs(context.snapshot(), ControlName::Qiel),
            violations,
            &format!("{}/{} tests passing, zero errors", qa.passing, qa.total),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::context_with;
    use foreman_constitutional::QaResult;

    #[tokio::test]
    async fn ninety_nine_percent_fails() {
        let (_tmp, ctx) = context_with(&[("qa-run.log", "99/100")]).await;
        let result = QaIntegrity.validate(&ctx.with_qa(QaResult::new(100, 99, 1))).await;
        assert!(!result.passed());
        assert_eq!(result.violations[0].code, "QIEL_QUALITY_SUPREMACY");
        assert_eq!(result.evidence.len(), 1);
    }

    #[tokio::test]
    async fn missing_qa_run_fails() {
        let (_tmp, ctx) = context_with(&[]).await;
        let result = QaIntegrity.validate(&ctx).await;
        assert_eq!(result.violations[0].code, "QIEL_NO_QA_RUN");
    }

    #[tokio::test]
    async fn green_passes() {
        let (_tmp, ctx) = context_with(&[]).await;
        let result = QaIntegrity.validate(&ctx.with_qa(QaResult::all_green(42))).await;
        assert!(result.passed());
        assert_eq!(result.message, "QIEL validation passed: 42/42 tests passing, zero errors");
    }
}
