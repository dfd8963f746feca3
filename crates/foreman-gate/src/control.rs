//! The control seam and the set the gate runs

use crate::context::GateContext;
use crate::controls::{
    ArchitectureApproval, BuildPhilosophyCompliance, ConstitutionalIntegrity, EvidenceCompliance,
    ExecutionBoundary, GovernanceSupremacy, IncidentFeedback, QaIntegrity, SecretExposure,
};
use crate::result::ControlResult;
use async_trait::async_trait;
use foreman_evidence::ControlName;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One governance control
///
/// A control reports a verdict; it never errors. Anything it cannot
/// establish is a violation.
#[async_trait]
pub trait GovernanceControl: Send + Sync {
    /// Slot this control fills
    fn name(&self) -> ControlName;

    /// Validate the context
    async fn validate(&self, context: &GateContext) -> ControlResult;
}

/// Controls keyed by slot; iterated in gate order
#[derive(Clone)]
pub struct ControlSet {
    controls: BTreeMap<ControlName, Arc<dyn GovernanceControl>>,
}

impl fmt::Debug for ControlSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.controls.keys()).finish()
    }
}

impl Default for ControlSet {
    fn default() -> Self {
        Self::empty()
            .with_control(QaIntegrity)
            .with_control(ConstitutionalIntegrity::default())
            .with_control(ArchitectureApproval)
            .with_control(IncidentFeedback)
            .with_control(EvidenceCompliance)
            .with_control(SecretExposure::default())
            .with_control(ExecutionBoundary)
            .with_control(GovernanceSupremacy)
            .with_control(BuildPhilosophyCompliance)
    }
}

impl ControlSet {
    /// Set with no controls
    #[must_use]
    pub fn empty() -> Self {
        Self {
            controls: BTreeMap::new(),
        }
    }

    /// Install `control` in its slot, replacing what was there
    #[must_use]
    pub fn with_control(mut self, control: impl GovernanceControl + 'static) -> Self {
        self.controls.insert(control.name(), Arc::new(control));
        self
    }

    /// Control in a slot
    #[must_use]
    pub fn get(&self, name: ControlName) -> Option<&Arc<dyn GovernanceControl>> {
        self.controls.get(&name)
    }

    /// Slots left empty
    #[must_use]
    pub fn missing(&self) -> Vec<ControlName> {
        ControlName::ALL
            .into_iter()
            .filter(|c| !self.controls.contains_key(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_fills_every_slot() {
        assert!(ControlSet::default().missing().is_empty());
        assert_eq!(ControlSet::empty().missing(), ControlName::ALL.to_vec());
    }
}
