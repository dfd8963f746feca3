//! Model Escalation Governor
//!
//! Decides whether a caller may use a stronger (more expensive) model tier.
//! A request is looked up in the policy table, then passes the policy,
//! budget, justification and safety checks in that order. The first failing
//! check fails the request closed at [`ModelTier::DEFAULT`] and charges
//! nothing. An approval charges the shared [`BudgetStore`] atomically.
//!
//! Every decision is written to the governance log.

mod budget;
mod policy;
mod tier;

pub use budget::{BudgetImpact, BudgetLimits, BudgetStats, BudgetStore, CognitiveBudget, Usage};
pub use policy::{default_policies, EscalationPolicy, EscalationReason, PolicyType};
pub use tier::{ModelTier, TierPrice};

use crate::error::ForemanError;
use foreman_constitutional::{AuditLogger, Severity};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Token estimate used when the caller gives none
pub const DEFAULT_TOKEN_ESTIMATE: u64 = 100_000;

/// Caller's description of the task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionContext {
    /// Free-form task type
    pub task_type: String,
    /// `low`, `medium` or `high`
    pub complexity: String,
    /// Files the task touches
    pub files_affected: u32,
    /// Task changes architecture
    pub is_architecture_task: bool,
    /// Task is governance work
    pub is_governance_task: bool,
}

/// Why a stronger tier is needed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    /// What the task needs that the default tier cannot give
    pub summary: String,
    /// Alternatives considered and rejected
    #[serde(default)]
    pub alternatives_considered: Vec<String>,
}

impl Justification {
    /// Justification with no alternatives listed
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            alternatives_considered: Vec::new(),
        }
    }
}

/// Kind of governance check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// Policy table lookup
    Policy,
    /// Budget ceilings
    Budget,
    /// Justification presence
    Justification,
    /// Safety conditions
    Safety,
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceCheck {
    /// Which check
    pub check_type: CheckType,
    /// Whether it passed
    pub passed: bool,
    /// Short message
    pub message: String,
    /// What blocked it, when it failed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<String>,
}

impl GovernanceCheck {
    fn pass(check_type: CheckType, message: impl Into<String>) -> Self {
        Self {
            check_type,
            passed: true,
            message: message.into(),
            blockers: Vec::new(),
        }
    }

    fn fail(check_type: CheckType, message: impl Into<String>, blockers: Vec<String>) -> Self {
        Self {
            check_type,
            passed: false,
            message: message.into(),
            blockers,
        }
    }
}

/// Governor decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernedEscalationResult {
    /// Whether the stronger tier was granted
    pub allowed: bool,
    /// Tier to use
    pub selected_tier: ModelTier,
    /// Policy applied; `forbidden` when none matched
    pub policy_type: PolicyType,
    /// Checks run, in order
    pub checks: Vec<GovernanceCheck>,
    /// Justification supplied with an approved request
    pub justification: Option<Justification>,
    /// Amounts charged
    pub budget_impact: BudgetImpact,
    /// Tiers to try, strongest first
    pub fallback_chain: Vec<ModelTier>,
}

impl GovernedEscalationResult {
    fn denied(policy_type: PolicyType, checks: Vec<GovernanceCheck>) -> Self {
        Self {
            allowed: false,
            selected_tier: ModelTier::DEFAULT,
            policy_type,
            checks,
            justification: None,
            budget_impact: BudgetImpact::default(),
            fallback_chain: ModelTier::denied_chain(),
        }
    }
}

/// Policy counts of [`GovernorStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCounts {
    /// Rows in the table
    pub total: usize,
    /// Allowed rows
    pub allowed: usize,
    /// Forbidden rows
    pub forbidden: usize,
    /// Mandatory rows
    pub mandatory: usize,
}

/// Budget usage and policy table summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GovernorStats {
    /// Budget usage
    pub budget: BudgetStats,
    /// Policy counts
    pub policies: PolicyCounts,
}

/// Gatekeeper for stronger model tiers
#[derive(Debug, Clone)]
pub struct ModelEscalationGovernor {
    policies: Arc<Vec<EscalationPolicy>>,
    budget: Arc<BudgetStore>,
    audit: AuditLogger,
}

impl ModelEscalationGovernor {
    /// Governor over the default policies and a shared budget
    #[must_use]
    pub fn new(budget: Arc<BudgetStore>, audit: AuditLogger) -> Self {
        Self {
            policies: Arc::new(default_policies()),
            budget,
            audit,
        }
    }

    /// Replace the policy table
    #[must_use]
    pub fn with_policies(mut self, policies: Vec<EscalationPolicy>) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    /// Policy table
    #[inline]
    #[must_use]
    pub fn policies(&self) -> &[EscalationPolicy] {
        &self.policies
    }

    /// Current budget
    #[must_use]
    pub fn budget(&self) -> CognitiveBudget {
        self.budget.snapshot()
    }

    /// Decide an escalation request
    ///
    /// `estimated_tokens` defaults to [`DEFAULT_TOKEN_ESTIMATE`].
    ///
    /// # Errors
    /// [`ForemanError::Audit`] if the decision cannot be logged
    pub async fn request_escalation(
        &self,
        context: &SelectionContext,
        reason: EscalationReason,
        justification: Option<Justification>,
        estimated_tokens: Option<u64>,
    ) -> Result<GovernedEscalationResult, ForemanError> {
        let tokens = estimated_tokens.unwrap_or(DEFAULT_TOKEN_ESTIMATE);

        let Some(policy) = self.policies.iter().find(|p| p.reason == reason) else {
            self.audit
                .record(
                    "model_escalation_no_policy",
                    Severity::Medium,
                    format!("No policy for reason: {reason}"),
                    &json!({ "reason": reason, "context": context }),
                )
                .await?;
            return Ok(self.deny(
                reason,
                PolicyType::Forbidden,
                vec![GovernanceCheck::fail(
                    CheckType::Policy,
                    "No policy found",
                    vec!["Unknown reason".to_string()],
                )],
            ));
        };

        if policy.policy_type == PolicyType::Forbidden {
            self.audit
                .record(
                    "escalation_forbidden",
                    Severity::Info,
                    format!("Escalation forbidden: {reason}"),
                    &json!({ "reason": reason, "policy": policy }),
                )
                .await?;
            return Ok(self.deny(
                reason,
                policy.policy_type,
                vec![GovernanceCheck::fail(
                    CheckType::Policy,
                    "Forbidden",
                    policy.safety_conditions.clone(),
                )],
            ));
        }

        let mut checks = vec![GovernanceCheck::pass(
            CheckType::Policy,
            format!("Policy: {}", policy.policy_type),
        )];

        let impact = BudgetImpact {
            tokens,
            cost: policy.target.cost_for(tokens),
            escalations: 1,
        };
        if !policy.bypass_quota_check && !self.budget.snapshot().can_afford(&impact) {
            return self.deny_over_budget(reason, policy, checks).await;
        }
        checks.push(GovernanceCheck::pass(CheckType::Budget, "Budget available"));

        if policy.requires_justification && justification.is_none() {
            checks.push(GovernanceCheck::fail(
                CheckType::Justification,
                "Justification required",
                vec!["Must provide justification".to_string()],
            ));
            self.log_denial(reason, policy, "justification").await?;
            return Ok(self.deny(reason, policy.policy_type, checks));
        }

        // A concurrent approval may have spent the budget since the check above.
        if !self.budget.try_charge(&impact, policy.bypass_quota_check) {
            checks.pop();
            return self.deny_over_budget(reason, policy, checks).await;
        }

        checks.push(GovernanceCheck::pass(CheckType::Justification, "Justification OK"));
        checks.push(GovernanceCheck::pass(CheckType::Safety, "Safety conditions met"));

        let recorded = self
            .audit
            .record(
                "model_escalation_approved",
                Severity::Info,
                format!("Escalation approved: {reason} → {}", policy.target),
                &json!({
                    "reason": reason,
                    "model": policy.target,
                    "justification": justification,
                    "budget_impact": impact,
                }),
            )
            .await;
        if let Err(e) = recorded {
            // An unaudited approval must not spend budget
            self.budget.refund(&impact);
            tracing::warn!(%reason, error = %e, "approval audit failed, charge refunded");
            return Err(e.into());
        }
        metrics::counter!("foreman_model_escalations_total", "reason" => reason.as_str(), "outcome" => "approved")
            .increment(1);
        tracing::info!(%reason, tier = %policy.target, tokens, cost = impact.cost, "model escalation approved");

        Ok(GovernedEscalationResult {
            allowed: true,
            selected_tier: policy.target,
            policy_type: policy.policy_type,
            checks,
            justification,
            budget_impact: impact,
            fallback_chain: policy.target.fallback_chain(),
        })
    }

    fn deny(
        &self,
        reason: EscalationReason,
        policy_type: PolicyType,
        checks: Vec<GovernanceCheck>,
    ) -> GovernedEscalationResult {
        metrics::counter!("foreman_model_escalations_total", "reason" => reason.as_str(), "outcome" => "denied")
            .increment(1);
        tracing::info!(%reason, %policy_type, "model escalation denied");
        GovernedEscalationResult::denied(policy_type, checks)
    }

    async fn deny_over_budget(
        &self,
        reason: EscalationReason,
        policy: &EscalationPolicy,
        mut checks: Vec<GovernanceCheck>,
    ) -> Result<GovernedEscalationResult, ForemanError> {
        checks.push(GovernanceCheck::fail(CheckType::Budget, "Budget exceeded", Vec::new()));
        self.log_denial(reason, policy, "budget").await?;
        Ok(self.deny(reason, policy.policy_type, checks))
    }

    async fn log_denial(
        &self,
        reason: EscalationReason,
        policy: &EscalationPolicy,
        failed_check: &str,
    ) -> Result<(), ForemanError> {
        self.audit
            .record(
                "model_escalation_denied",
                Severity::Low,
                format!("Escalation denied: {reason} ({failed_check} check failed)"),
                &json!({ "reason": reason, "policy": policy, "budget": self.budget.snapshot() }),
            )
            .await?;
        Ok(())
    }

    /// Zero the shared budget
    ///
    /// # Errors
    /// [`ForemanError::Audit`] if the reset cannot be logged
    pub async fn reset_budget(&self) -> Result<CognitiveBudget, ForemanError> {
        let fresh = self.budget.reset();
        self.audit
            .record(
                "cognitive_budget_reset",
                Severity::Info,
                "Cognitive budget reset",
                &json!({ "budget": fresh }),
            )
            .await?;
        Ok(fresh)
    }

    /// Budget usage and policy counts
    #[must_use]
    pub fn stats(&self) -> GovernorStats {
        let count = |t: PolicyType| self.policies.iter().filter(|p| p.policy_type == t).count();
        GovernorStats {
            budget: self.budget.stats(),
            policies: PolicyCounts {
                total: self.policies.len(),
                allowed: count(PolicyType::Allowed),
                forbidden: count(PolicyType::Forbidden),
                mandatory: count(PolicyType::Mandatory),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_constitutional::{GovernanceEvent, GovernanceSink, MemorySink, SinkError};

    fn governor(limits: BudgetLimits) -> (ModelEscalationGovernor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let governor = ModelEscalationGovernor::new(
            Arc::new(BudgetStore::new(limits)),
            AuditLogger::new(sink.clone()),
        );
        (governor, sink)
    }

    #[tokio::test]
    async fn forbidden_reason_fails_closed() {
        let (governor, sink) = governor(BudgetLimits::default());
        let result = governor
            .request_escalation(&SelectionContext::default(), EscalationReason::HeavyTask, None, None)
            .await
            .unwrap();
        assert!(!result.allowed);
        assert_eq!(result.selected_tier, ModelTier::Gpt4oMini);
        assert_eq!(result.policy_type, PolicyType::Forbidden);
        assert_eq!(result.checks[0].blockers, vec!["Builder-only task".to_string()]);
        assert_eq!(result.fallback_chain, vec![ModelTier::Gpt4oMini, ModelTier::LocalBuilder]);
        assert_eq!(sink.events_of_type("escalation_forbidden").len(), 1);
        assert_eq!(governor.budget().escalations_used, 0);
    }

    #[tokio::test]
    async fn unknown_reason_is_logged() {
        let (governor, sink) = governor(BudgetLimits::default());
        let result = governor
            .request_escalation(&SelectionContext::default(), EscalationReason::ComplexReasoning, None, None)
            .await
            .unwrap();
        assert!(!result.allowed);
        assert_eq!(result.checks[0].message, "No policy found");
        assert_eq!(sink.events_of_type("model_escalation_no_policy").len(), 1);
    }

    #[tokio::test]
    async fn missing_justification_denied() {
        let (governor, sink) = governor(BudgetLimits::default());
        let result = governor
            .request_escalation(&SelectionContext::default(), EscalationReason::ArchitectureImpact, None, None)
            .await
            .unwrap();
        assert!(!result.allowed);
        let last = result.checks.last().unwrap();
        assert_eq!(last.check_type, CheckType::Justification);
        assert_eq!(last.blockers, vec!["Must provide justification".to_string()]);
        assert_eq!(result.budget_impact, BudgetImpact::default());
        assert_eq!(sink.events_of_type("model_escalation_denied").len(), 1);
        assert_eq!(governor.budget().tokens_used, 0);
    }

    #[tokio::test]
    async fn approval_charges_budget() {
        let (governor, sink) = governor(BudgetLimits::default());
        let result = governor
            .request_escalation(
                &SelectionContext::default(),
                EscalationReason::MultiFileRefactor,
                Some(Justification::new("touches twelve modules")),
                Some(1_000_000),
            )
            .await
            .unwrap();
        assert!(result.allowed);
        assert_eq!(result.selected_tier, ModelTier::Gpt41);
        assert!((result.budget_impact.cost - 7.5).abs() < 1e-9);
        assert_eq!(result.checks.len(), 4);
        assert!(result.checks.iter().all(|c| c.passed));
        assert_eq!(result.fallback_chain[0], ModelTier::Gpt41);

        let budget = governor.budget();
        assert_eq!(budget.tokens_used, 1_000_000);
        assert_eq!(budget.escalations_used, 1);
        assert_eq!(sink.events_of_type("model_escalation_approved").len(), 1);
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl GovernanceSink for FailingSink {
        async fn write(&self, _event: &GovernanceEvent) -> Result<(), SinkError> {
            Err(SinkError("governance store offline".into()))
        }
    }

    #[tokio::test]
    async fn unrecorded_approval_leaves_budget_untouched() {
        let governor = ModelEscalationGovernor::new(
            Arc::new(BudgetStore::new(BudgetLimits::default())),
            AuditLogger::new(Arc::new(FailingSink)),
        );
        let before = governor.budget();
        let result = governor
            .request_escalation(
                &SelectionContext::default(),
                EscalationReason::MultiFileRefactor,
                Some(Justification::new("touches twelve modules")),
                Some(1_000_000),
            )
            .await;
        assert!(matches!(result, Err(ForemanError::Audit(_))));
        assert_eq!(governor.budget(), before);
    }

    #[tokio::test]
    async fn exhausted_budget_denies_but_bypass_still_approves() {
        let (governor, _) = governor(BudgetLimits {
            escalations_allowed: 0,
            ..BudgetLimits::default()
        });
        let denied = governor
            .request_escalation(
                &SelectionContext::default(),
                EscalationReason::LargeContext,
                Some(Justification::new("400k token repo map")),
                None,
            )
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.checks.last().unwrap().message, "Budget exceeded");

        let mandatory = governor
            .request_escalation(&SelectionContext::default(), EscalationReason::GovernanceTask, None, None)
            .await
            .unwrap();
        assert!(mandatory.allowed);
        assert_eq!(mandatory.selected_tier, ModelTier::Gpt51);
    }

    #[tokio::test]
    async fn reset_and_stats() {
        let (governor, sink) = governor(BudgetLimits::default());
        governor
            .request_escalation(&SelectionContext::default(), EscalationReason::DriftAnalysis, None, None)
            .await
            .unwrap();
        let stats = governor.stats();
        assert_eq!(stats.policies.total, 9);
        assert!((stats.budget.escalations.percentage - 2.0).abs() < 1e-9);

        let fresh = governor.reset_budget().await.unwrap();
        assert_eq!(fresh.escalations_used, 0);
        assert_eq!(sink.events_of_type("cognitive_budget_reset").len(), 1);
    }
}
