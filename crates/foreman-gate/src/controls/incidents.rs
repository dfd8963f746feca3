use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::controls::bucket_refs;
use crate::result::{ControlResult, Violation};
use async_trait::async_trait;
use foreman_constitutional::Severity;
use foreman_evidence::ControlName;

/// CS3: no unresolved incident is filed against the PR
#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentFeedback;

#[async_trait]
impl GovernanceControl for IncidentFeedback {
    fn name(&self) -> ControlName {
        ControlName::Cs3
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let violations = context
            .open_incidents()
            .map(|i| {
                Violation::new(
                    "CS3_OPEN_INCIDENT",
                    format!("Incident {} unresolved: {}", i.id, i.summary),
                    Severity::High,
                )
            })
            .collect();

        ControlResult::from_violations(
            ControlName::Cs3,
            Severity::High,
            bucket_refs(context.snapshot(), ControlName::Cs3),
            violations,
            "No open incidents",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Incident;
    use crate::controls::fixtures::context_with;

    fn incident(id: &str, pr_number: u64, resolved: bool) -> Incident {
        Incident {
            id: id.into(),
            pr_number,
            summary: "login broken".into(),
            resolved,
        }
    }

    #[tokio::test]
    async fn counts_only_open_incidents_on_this_pr() {
        let (_tmp, ctx) = context_with(&[]).await;
        let ctx = ctx
            .with_incident(incident("inc-1", 7, false))
            .with_incident(incident("inc-2", 7, true))
            .with_incident(incident("inc-3", 8, false));
        let result = IncidentFeedback.validate(&ctx).await;
        assert_eq!(result.violations.len(), 1);
        assert!(result.violations[0].message.starts_with("Incident inc-1"));
    }
}
