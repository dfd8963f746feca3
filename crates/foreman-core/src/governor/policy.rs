//! Reason to policy table

use super::tier::ModelTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a caller wants a stronger tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Work on a builder-sized task
    HeavyTask,
    /// Change touches the architecture
    ArchitectureImpact,
    /// Refactor spanning several files
    MultiFileRefactor,
    /// Planning an autonomy wave
    AutonomyWavePlanning,
    /// Reasoning about constitutional rules
    ConstitutionalReasoning,
    /// Context too large for the default tier
    LargeContext,
    /// Activating governance memory
    MemoryActivation,
    /// Governance work
    GovernanceTask,
    /// Drift analysis
    DriftAnalysis,
    /// Open-ended reasoning; no policy
    ComplexReasoning,
    /// Coordinating several agents; no policy
    MultiAgentCoordination,
    /// Milestone pressure; no policy
    ProjectMilestone,
}

impl EscalationReason {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeavyTask => "heavy_task",
            Self::ArchitectureImpact => "architecture_impact",
            Self::MultiFileRefactor => "multi_file_refactor",
            Self::AutonomyWavePlanning => "autonomy_wave_planning",
            Self::ConstitutionalReasoning => "constitutional_reasoning",
            Self::LargeContext => "large_context",
            Self::MemoryActivation => "memory_activation",
            Self::GovernanceTask => "governance_task",
            Self::DriftAnalysis => "drift_analysis",
            Self::ComplexReasoning => "complex_reasoning",
            Self::MultiAgentCoordination => "multi_agent_coordination",
            Self::ProjectMilestone => "project_milestone",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a reason is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    /// Granted when checks pass
    Allowed,
    /// Never granted
    Forbidden,
    /// Always granted; budget is still charged
    Mandatory,
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allowed => "allowed",
            Self::Forbidden => "forbidden",
            Self::Mandatory => "mandatory",
        })
    }
}

/// One row of the policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Reason this row covers
    pub reason: EscalationReason,
    /// Treatment
    pub policy_type: PolicyType,
    /// Tier granted on approval
    pub target: ModelTier,
    /// Whether a [`Justification`](super::Justification) must accompany the request
    pub requires_justification: bool,
    /// Skip the budget check (the budget is still charged)
    pub bypass_quota_check: bool,
    /// Conditions reported as blockers when forbidden
    #[serde(default)]
    pub safety_conditions: Vec<String>,
}

impl EscalationPolicy {
    fn row(
        reason: EscalationReason,
        policy_type: PolicyType,
        target: ModelTier,
        requires_justification: bool,
        bypass_quota_check: bool,
    ) -> Self {
        Self {
            reason,
            policy_type,
            target,
            requires_justification,
            bypass_quota_check,
            safety_conditions: Vec::new(),
        }
    }
}

/// The standard policy table
#[must_use]
pub fn default_policies() -> Vec<EscalationPolicy> {
    use EscalationReason as R;
    use ModelTier as T;
    use PolicyType as P;

    let mut heavy = EscalationPolicy::row(R::HeavyTask, P::Forbidden, T::Gpt4oMini, false, false);
    heavy.safety_conditions.push("Builder-only task".to_string());

    vec![
        EscalationPolicy::row(R::ArchitectureImpact, P::Allowed, T::Gpt51, true, false),
        EscalationPolicy::row(R::MultiFileRefactor, P::Allowed, T::Gpt41, true, false),
        EscalationPolicy::row(R::AutonomyWavePlanning, P::Allowed, T::Gpt51, false, true),
        EscalationPolicy::row(R::ConstitutionalReasoning, P::Allowed, T::Gpt51, false, true),
        EscalationPolicy::row(R::LargeContext, P::Allowed, T::Gpt41, true, false),
        EscalationPolicy::row(R::MemoryActivation, P::Mandatory, T::Gpt51, false, true),
        EscalationPolicy::row(R::GovernanceTask, P::Mandatory, T::Gpt51, false, true),
        EscalationPolicy::row(R::DriftAnalysis, P::Mandatory, T::Gpt51, false, true),
        heavy,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_shape() {
        let policies = default_policies();
        assert_eq!(policies.len(), 9);
        let count = |t| policies.iter().filter(|p| p.policy_type == t).count();
        assert_eq!(count(PolicyType::Allowed), 5);
        assert_eq!(count(PolicyType::Mandatory), 3);
        assert_eq!(count(PolicyType::Forbidden), 1);
    }

    #[test]
    fn unlisted_reasons_have_no_policy() {
        let policies = default_policies();
        for reason in [
            EscalationReason::ComplexReasoning,
            EscalationReason::MultiAgentCoordination,
            EscalationReason::ProjectMilestone,
        ] {
            assert!(policies.iter().all(|p| p.reason != reason));
        }
    }
}
