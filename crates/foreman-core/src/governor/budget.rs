//! Shared cognitive budget

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Budget ceilings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetLimits {
    /// Token ceiling
    pub token_budget: u64,
    /// USD ceiling
    pub cost_budget: f64,
    /// Escalation count ceiling
    pub escalations_allowed: u32,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            token_budget: 10_000_000,
            cost_budget: 100.0,
            escalations_allowed: 50,
        }
    }
}

/// Amounts charged by one approval
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetImpact {
    /// Tokens
    pub tokens: u64,
    /// USD
    pub cost: f64,
    /// Escalations, zero or one
    pub escalations: u32,
}

/// Ceilings plus usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveBudget {
    /// Ceilings
    pub limits: BudgetLimits,
    /// Tokens consumed
    pub tokens_used: u64,
    /// USD consumed
    pub cost_used: f64,
    /// Escalations granted
    pub escalations_used: u32,
}

impl CognitiveBudget {
    fn fresh(limits: BudgetLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Whether `impact` fits under every ceiling
    #[must_use]
    pub fn can_afford(&self, impact: &BudgetImpact) -> bool {
        self.tokens_used.saturating_add(impact.tokens) <= self.limits.token_budget
            && self.cost_used + impact.cost <= self.limits.cost_budget
            && self.escalations_used < self.limits.escalations_allowed
    }

    fn charge(&mut self, impact: &BudgetImpact) {
        self.tokens_used = self.tokens_used.saturating_add(impact.tokens);
        self.cost_used += impact.cost;
        self.escalations_used = self.escalations_used.saturating_add(impact.escalations);
    }

    fn refund(&mut self, impact: &BudgetImpact) {
        self.tokens_used = self.tokens_used.saturating_sub(impact.tokens);
        self.cost_used = (self.cost_used - impact.cost).max(0.0);
        self.escalations_used = self.escalations_used.saturating_sub(impact.escalations);
    }
}

/// One usage line of [`BudgetStats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Consumed
    pub used: f64,
    /// Ceiling
    pub total: f64,
    /// `used / total * 100`, zero for a zero ceiling
    pub percentage: f64,
}

impl Usage {
    fn of(used: f64, total: f64) -> Self {
        let percentage = if total > 0.0 { used / total * 100.0 } else { 0.0 };
        Self { used, total, percentage }
    }
}

/// Budget usage percentages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetStats {
    /// Tokens
    pub tokens: Usage,
    /// USD
    pub cost: Usage,
    /// Escalations
    pub escalations: Usage,
}

/// Budget shared by every governor call
///
/// Check and charge happen under one lock, so concurrent approvals can
/// never overdraw it.
#[derive(Debug)]
pub struct BudgetStore {
    state: Mutex<CognitiveBudget>,
}

impl Default for BudgetStore {
    fn default() -> Self {
        Self::new(BudgetLimits::default())
    }
}

impl BudgetStore {
    /// Empty budget under `limits`
    #[must_use]
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            state: Mutex::new(CognitiveBudget::fresh(limits)),
        }
    }

    /// Copy of the current budget
    #[must_use]
    pub fn snapshot(&self) -> CognitiveBudget {
        *self.state.lock()
    }

    /// Charge `impact` if it fits, or skip the ceiling check when `bypass` is set
    ///
    /// Returns whether the charge was applied.
    pub fn try_charge(&self, impact: &BudgetImpact, bypass: bool) -> bool {
        let mut budget = self.state.lock();
        if !bypass && !budget.can_afford(impact) {
            return false;
        }
        budget.charge(impact);
        true
    }

    /// Give back a charge whose approval could not be recorded
    pub fn refund(&self, impact: &BudgetImpact) {
        self.state.lock().refund(impact);
    }

    /// Zero all usage; returns the fresh budget
    pub fn reset(&self) -> CognitiveBudget {
        let mut budget = self.state.lock();
        *budget = CognitiveBudget::fresh(budget.limits);
        *budget
    }

    /// Usage percentages
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> BudgetStats {
        let b = self.snapshot();
        BudgetStats {
            tokens: Usage::of(b.tokens_used as f64, b.limits.token_budget as f64),
            cost: Usage::of(b.cost_used, b.limits.cost_budget),
            escalations: Usage::of(f64::from(b.escalations_used), f64::from(b.limits.escalations_allowed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impact(tokens: u64, cost: f64) -> BudgetImpact {
        BudgetImpact {
            tokens,
            cost,
            escalations: 1,
        }
    }

    #[test]
    fn charge_until_exhausted() {
        let store = BudgetStore::new(BudgetLimits {
            token_budget: 250,
            cost_budget: 10.0,
            escalations_allowed: 10,
        });
        assert!(store.try_charge(&impact(100, 1.0), false));
        assert!(store.try_charge(&impact(100, 1.0), false));
        assert!(!store.try_charge(&impact(100, 1.0), false));
        assert_eq!(store.snapshot().tokens_used, 200);
    }

    #[test]
    fn refund_restores_usage() {
        let store = BudgetStore::default();
        assert!(store.try_charge(&impact(100, 1.5), false));
        store.refund(&impact(100, 1.5));
        assert_eq!(store.snapshot(), CognitiveBudget::fresh(BudgetLimits::default()));

        store.refund(&impact(5, 1.0));
        assert_eq!(store.snapshot().tokens_used, 0);
        assert_eq!(store.snapshot().escalations_used, 0);
    }

    #[test]
    fn escalation_ceiling_is_strict() {
        let store = BudgetStore::new(BudgetLimits {
            escalations_allowed: 1,
            ..BudgetLimits::default()
        });
        assert!(store.try_charge(&impact(1, 0.0), false));
        assert!(!store.try_charge(&impact(1, 0.0), false));
        assert!(store.try_charge(&impact(1, 0.0), true));
        assert_eq!(store.snapshot().escalations_used, 2);
    }

    #[test]
    fn reset_keeps_limits() {
        let limits = BudgetLimits {
            token_budget: 1_000,
            ..BudgetLimits::default()
        };
        let store = BudgetStore::new(limits);
        store.try_charge(&impact(500, 0.5), false);
        assert!((store.stats().tokens.percentage - 50.0).abs() < 1e-9);
        let fresh = store.reset();
        assert_eq!(fresh.tokens_used, 0);
        assert_eq!(fresh.limits, limits);
    }
}
