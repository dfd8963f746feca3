//! The nine governance controls, in gate execution order

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of a governance control
///
/// Variant order is execution order; `Ord` follows it so maps keyed by
/// control iterate the way the gate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ControlName {
    /// QA Integrity Enforcement Layer
    #[serde(rename = "QIEL")]
    Qiel,
    /// Constitutional integrity
    #[serde(rename = "CS1")]
    Cs1,
    /// Architecture approval
    #[serde(rename = "CS2")]
    Cs2,
    /// Incident feedback
    #[serde(rename = "CS3")]
    Cs3,
    /// Compliance monitoring
    #[serde(rename = "CS4")]
    Cs4,
    /// Secret exposure in changed files
    #[serde(rename = "CS5")]
    Cs5,
    /// Execution boundary
    #[serde(rename = "CS6")]
    Cs6,
    /// Governance supremacy rule
    #[serde(rename = "GSR")]
    Gsr,
    /// Build philosophy compliance
    #[serde(rename = "BuildPhilosophy")]
    BuildPhilosophy,
}

impl ControlName {
    /// Every control in execution order
    pub const ALL: [ControlName; 9] = [
        Self::Qiel,
        Self::Cs1,
        Self::Cs2,
        Self::Cs3,
        Self::Cs4,
        Self::Cs5,
        Self::Cs6,
        Self::Gsr,
        Self::BuildPhilosophy,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qiel => "QIEL",
            Self::Cs1 => "CS1",
            Self::Cs2 => "CS2",
            Self::Cs3 => "CS3",
            Self::Cs4 => "CS4",
            Self::Cs5 => "CS5",
            Self::Cs6 => "CS6",
            Self::Gsr => "GSR",
            Self::BuildPhilosophy => "BuildPhilosophy",
        }
    }

    /// Human-readable title used in reports
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Qiel => "QA Integrity Enforcement",
            Self::Cs1 => "Constitutional Integrity",
            Self::Cs2 => "Architecture Approval",
            Self::Cs3 => "Incident Feedback",
            Self::Cs4 => "Compliance Monitoring",
            Self::Cs5 => "Secret Exposure",
            Self::Cs6 => "Execution Boundary",
            Self::Gsr => "Governance Supremacy Rule",
            Self::BuildPhilosophy => "Build Philosophy",
        }
    }
}

impl fmt::Display for ControlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown control name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control: {0}")]
pub struct UnknownControl(pub String);

impl FromStr for ControlName {
    type Err = UnknownControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownControl(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_sorted_by_ord() {
        let mut sorted = ControlName::ALL;
        sorted.sort();
        assert_eq!(sorted, ControlName::ALL);
    }

    #[test]
    fn wire_names_roundtrip() {
        for control in ControlName::ALL {
            let json = serde_json::to_string(&control).unwrap();
            assert_eq!(json, format!("\"{}\"", control.as_str()));
            assert_eq!(control.as_str().parse::<ControlName>().unwrap(), control);
        }
    }

    #[test]
    fn unknown_name_rejected() {
        assert!("CS7".parse::<ControlName>().is_err());
    }
}
