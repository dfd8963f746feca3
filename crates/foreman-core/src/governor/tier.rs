//! Capability tiers and their prices

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model capability tier, cheapest last in [`ModelTier::DESCENDING`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelTier {
    /// Default tier
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    /// General tier
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    /// Large-context tier
    #[serde(rename = "gpt-4.1")]
    Gpt41,
    /// Strongest reasoning tier
    #[serde(rename = "gpt-5.1")]
    Gpt51,
    /// Local builder, free
    #[serde(rename = "local-builder")]
    LocalBuilder,
}

/// USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPrice {
    /// Input price
    pub input: f64,
    /// Output price
    pub output: f64,
}

impl ModelTier {
    /// Tier used whenever escalation is not granted
    pub const DEFAULT: Self = Self::Gpt4oMini;

    /// Fallback order below an approved tier
    pub const DESCENDING: [Self; 4] = [Self::Gpt41, Self::Gpt4o, Self::Gpt4oMini, Self::LocalBuilder];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt41 => "gpt-4.1",
            Self::Gpt51 => "gpt-5.1",
            Self::LocalBuilder => "local-builder",
        }
    }

    /// Price per million tokens
    #[must_use]
    pub fn price(self) -> TierPrice {
        let (input, output) = match self {
            Self::Gpt4oMini => (0.15, 0.60),
            Self::Gpt4o => (2.50, 10.00),
            Self::Gpt41 => (3.00, 12.00),
            Self::Gpt51 => (10.00, 30.00),
            Self::LocalBuilder => (0.0, 0.0),
        };
        TierPrice { input, output }
    }

    /// Estimated USD for `tokens` at the blended input/output price
    #[must_use]
    pub fn cost_for(self, tokens: u64) -> f64 {
        let price = self.price();
        #[allow(clippy::cast_precision_loss)]
        let tokens = tokens as f64;
        (price.input + price.output) / 2.0 * tokens / 1_000_000.0
    }

    /// `self` followed by the descending chain, without repeats
    #[must_use]
    pub fn fallback_chain(self) -> Vec<Self> {
        let mut chain = vec![self];
        for tier in Self::DESCENDING {
            if !chain.contains(&tier) {
                chain.push(tier);
            }
        }
        chain
    }

    /// Chain returned when escalation is refused
    #[must_use]
    pub fn denied_chain() -> Vec<Self> {
        vec![Self::Gpt4oMini, Self::LocalBuilder]
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
