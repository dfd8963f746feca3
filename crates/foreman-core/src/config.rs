//! Foreman configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid.

use crate::error::ConfigError;
use crate::escalation::DetectorConfig;
use crate::governor::BudgetLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForemanConfig {
    /// One JSON file per checkpoint
    pub checkpoint_dir: PathBuf,
    /// One JSON file per evidence snapshot
    pub snapshot_dir: PathBuf,
    /// Autonomy state, transitions and reauthorization requests
    pub state_dir: PathBuf,
    /// Hard ceiling on build iterations per request
    pub max_iterations: u32,
    /// Checkpoints kept in the read-through cache
    pub checkpoint_cache_capacity: u64,
    /// Escalation thresholds and keywords
    pub detector: DetectorConfig,
    /// Cognitive budget ceilings
    pub budget: BudgetLimits,
    /// Governance gate deadline
    pub gate_timeout_secs: u64,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from(".foreman/checkpoints"),
            snapshot_dir: PathBuf::from(".foreman/snapshots"),
            state_dir: PathBuf::from(".foreman/autonomy"),
            max_iterations: 100,
            checkpoint_cache_capacity: 10_000,
            detector: DetectorConfig::default(),
            budget: BudgetLimits::default(),
            gate_timeout_secs: 60,
        }
    }
}

impl ForemanConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML, [`ConfigError::Invalid`] on
    /// out-of-range values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`ForemanConfig::from_toml_str`]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded foreman config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if self.gate_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "gate_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Gate deadline as a duration
    #[inline]
    #[must_use]
    pub fn gate_timeout(&self) -> Duration {
        Duration::from_secs(self.gate_timeout_secs)
    }

    /// With checkpoint directory
    #[inline]
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// With snapshot directory
    #[inline]
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// With autonomy state directory
    #[inline]
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// With iteration ceiling
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// With detector configuration
    #[inline]
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// With budget ceilings
    #[inline]
    #[must_use]
    pub fn with_budget(mut self, budget: BudgetLimits) -> Self {
        self.budget = budget;
        self
    }

    /// With gate deadline
    #[inline]
    #[must_use]
    pub fn with_gate_timeout_secs(mut self, secs: u64) -> Self {
        self.gate_timeout_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ForemanConfig::from_toml_str("").unwrap(), ForemanConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = ForemanConfig::from_toml_str(
            r#"
            max_iterations = 25
            checkpoint_dir = "/var/foreman/checkpoints"

            [detector]
            max_attempts = 3

            [budget]
            cost_budget = 5.0
            "#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.checkpoint_dir, PathBuf::from("/var/foreman/checkpoints"));
        assert_eq!(config.detector.max_attempts, 3);
        assert_eq!(config.detector.no_progress_window, 5);
        assert!((config.budget.cost_budget - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.gate_timeout_secs, 60);
    }

    #[test]
    fn zero_iterations_rejected() {
        let err = ForemanConfig::from_toml_str("max_iterations = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_iterations", .. }));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            ForemanConfig::from_toml_str("max_iterations = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreman.toml");
        tokio::fs::write(&path, "gate_timeout_secs = 30\n").await.unwrap();
        let config = ForemanConfig::load(&path).await.unwrap();
        assert_eq!(config.gate_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = ForemanConfig::load("/definitely/not/here.toml").await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
