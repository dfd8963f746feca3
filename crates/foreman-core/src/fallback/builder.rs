//! Builders and what they report back

use super::context::FallbackContext;
use crate::escalation::TestFailure;
use async_trait::async_trait;
use dashmap::DashMap;
use foreman_constitutional::QaResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Ways a builder attempt can fail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BuilderFailure {
    /// Builder reported a timeout
    #[error("builder timed out after {secs}s")]
    Timeout {
        /// Elapsed seconds
        secs: u64,
    },
    /// Model context or token quota exhausted
    #[error("token budget exhausted")]
    TokenExhaustion,
    /// Builder reports itself unhealthy
    #[error("builder unhealthy: {0}")]
    Unhealthy(String),
    /// Injected failure
    #[error("simulated failure: {0}")]
    Simulated(String),
    /// Builder is not registered or not reachable
    #[error("builder unavailable: {0}")]
    Unavailable(String),
    /// Ordinary error in the work itself
    #[error("{0}")]
    Application(String),
}

impl BuilderFailure {
    /// True for failures a different builder may not hit
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Application(_))
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::TokenExhaustion => "token_exhaustion",
            Self::Unhealthy(_) => "unhealthy",
            Self::Simulated(_) => "simulated",
            Self::Unavailable(_) => "unavailable",
            Self::Application(_) => "application",
        }
    }
}

/// A file written during an iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path
    pub path: String,
    /// New content
    pub content: String,
}

/// Result of one builder iteration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderOutput {
    /// QA run after the iteration
    pub qa: QaResult,
    /// Failing tests with messages
    #[serde(default)]
    pub failures: Vec<TestFailure>,
    /// Files written
    #[serde(default)]
    pub changed_files: Vec<ChangedFile>,
    /// Error the builder hit, if any
    #[serde(default)]
    pub error: Option<String>,
}

/// A builder agent
#[async_trait]
pub trait Builder: Send + Sync {
    /// Registry name, e.g. `copilot`
    fn name(&self) -> &str;

    /// Run one iteration against the context
    async fn execute(&self, context: &FallbackContext) -> Result<BuilderOutput, BuilderFailure>;
}

/// Builders by name
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: Arc<DashMap<String, Arc<dyn Builder>>>,
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("builders", &self.names())
            .finish()
    }
}

impl BuilderRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder under its own name, replacing any previous one
    pub fn register(&self, builder: Arc<dyn Builder>) {
        let name = builder.name().to_string();
        tracing::debug!(builder = %name, "builder registered");
        self.builders.insert(name, builder);
    }

    /// Builder by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Builder>> {
        self.builders.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
