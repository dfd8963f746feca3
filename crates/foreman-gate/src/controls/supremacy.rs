use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::controls::bucket_refs;
use crate::result::{ControlResult, Violation};
use async_trait::async_trait;
use foreman_constitutional::Severity;
use foreman_evidence::ControlName;

/// GSR: governance outranks convenience; a warning is a failure
#[derive(Debug, Clone, Copy, Default)]
pub struct GovernanceSupremacy;

#[async_trait]
impl GovernanceControl for GovernanceSupremacy {
    fn name(&self) -> ControlName {
        ControlName::Gsr
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let warnings = context.qa().warnings;
        let violations = if warnings > 0 {
            vec![Violation::new(
                "GSR_WARNINGS_PRESENT",
                format!("{warnings} warning(s) present. Zero warnings required."),
                Severity::High,
            )]
        } else {
            Vec::new()
        };

        ControlResult::from_violations(
            ControlName::Gsr,
            Severity::High,
            bucket_refs(context.snapshot(), ControlName::Gsr),
            violations,
            "Zero warnings",
        )
    }
}
