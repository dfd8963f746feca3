use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::controls::bucket_refs;
use crate::result::{ControlResult, Violation};
use async_trait::async_trait;
use foreman_constitutional::Severity;
use foreman_evidence::ControlName;

/// CS2: architecture changes merge only once approved
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchitectureApproval;

#[async_trait]
impl GovernanceControl for ArchitectureApproval {
    fn name(&self) -> ControlName {
        ControlName::Cs2
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let violations = context
            .architecture_changes()
            .iter()
            .filter(|c| c.approved_by.is_none())
            .map(|c| {
                Violation::new(
                    "CS2_ARCHITECTURE_UNAPPROVED",
                    format!("Architecture change lacks approval: {}", c.description),
                    Severity::High,
                )
            })
            .collect();

        ControlResult::from_violations(
            ControlName::Cs2,
            Severity::High,
            bucket_refs(context.snapshot(), ControlName::Cs2),
            violations,
            "Architecture changes approved",
        )
    }
}
