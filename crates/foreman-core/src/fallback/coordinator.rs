//! Sequential builder fallback
//!
//! When a builder fails for a reason another builder might not hit, the
//! coordinator walks that builder's fallback chain one entry at a time. Each
//! handoff is logged to the governance sink. An exhausted chain becomes a
//! terminal `BuilderNetworkFailure` for the Foreman.

use super::builder::{BuilderFailure, BuilderOutput, BuilderRegistry};
use super::context::FallbackContext;
use crate::error::ForemanError;
use crate::telemetry::{BuilderHealth, BuilderTelemetry};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use foreman_constitutional::{AuditLogger, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// What caused a fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    /// Injected failure
    SimulatedFailure,
    /// Builder timed out
    Timeout,
    /// Token quota exhausted
    TokenExhaustion,
    /// Builder unhealthy, by its own report or by telemetry
    Unhealthy,
    /// Builder not registered or unreachable
    Unavailable,
}

/// One logged handoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEvent {
    /// Task being built
    pub task_id: String,
    /// Builder handing off
    pub from: String,
    /// Builder taking over
    pub to: String,
    /// Failure that caused the handoff
    pub reason: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

/// Successful outcome of a possibly-fallen-back attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackResult {
    /// Always true; failures are errors
    pub success: bool,
    /// Whether a builder other than the primary produced the output
    pub fallback_used: bool,
    /// Builder that produced the output
    pub builder_used: String,
    /// The output
    pub output: BuilderOutput,
    /// Context as passed to the builder that succeeded
    pub context: FallbackContext,
}

/// Default builder to fallback-chain table
#[must_use]
pub fn default_chains() -> BTreeMap<String, Vec<String>> {
    let specialist = || vec!["copilot".to_string(), "local".to_string()];
    let mut chains = BTreeMap::new();
    chains.insert("copilot".to_string(), vec!["local".to_string()]);
    chains.insert("local".to_string(), Vec::new());
    for name in ["ui", "api", "schema", "integration", "qa"] {
        chains.insert(name.to_string(), specialist());
    }
    chains
}

fn trigger_for(health: BuilderHealth, failure: &BuilderFailure) -> Option<FallbackTrigger> {
    match failure {
        BuilderFailure::Simulated(_) => Some(FallbackTrigger::SimulatedFailure),
        BuilderFailure::Timeout { .. } => Some(FallbackTrigger::Timeout),
        BuilderFailure::TokenExhaustion => Some(FallbackTrigger::TokenExhaustion),
        BuilderFailure::Unhealthy(_) => Some(FallbackTrigger::Unhealthy),
        BuilderFailure::Unavailable(_) => Some(FallbackTrigger::Unavailable),
        BuilderFailure::Application(_) => health.is_unusable().then_some(FallbackTrigger::Unhealthy),
    }
}

/// Runs builders with sequential fallback
#[derive(Debug)]
pub struct FallbackCoordinator {
    registry: BuilderRegistry,
    chains: BTreeMap<String, Vec<String>>,
    injected: DashMap<String, String>,
    logs: DashMap<String, Vec<FallbackEvent>>,
    audit: AuditLogger,
    telemetry: Arc<BuilderTelemetry>,
}

impl FallbackCoordinator {
    /// Coordinator with the default chain table
    #[must_use]
    pub fn new(registry: BuilderRegistry, audit: AuditLogger, telemetry: Arc<BuilderTelemetry>) -> Self {
        Self {
            registry,
            chains: default_chains(),
            injected: DashMap::new(),
            logs: DashMap::new(),
            audit,
            telemetry,
        }
    }

    /// Override one builder's chain
    #[must_use]
    pub fn with_chain(mut self, builder: impl Into<String>, chain: Vec<String>) -> Self {
        self.chains.insert(builder.into(), chain);
        self
    }

    /// Governance logger shared with the orchestrator
    #[inline]
    #[must_use]
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Builder registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    /// Telemetry fed by every attempt
    #[inline]
    #[must_use]
    pub fn telemetry(&self) -> &Arc<BuilderTelemetry> {
        &self.telemetry
    }

    /// Fallback chain for a builder; unknown builders have none
    #[must_use]
    pub fn chain_for(&self, builder: &str) -> &[String] {
        self.chains.get(builder).map_or(&[], Vec::as_slice)
    }

    /// Make every attempt of `builder` fail until cleared
    pub fn inject_failure(&self, builder: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(builder, %reason, "failure injected");
        self.injected.insert(builder.to_string(), reason);
    }

    /// Remove an injected failure
    pub fn clear_injected_failure(&self, builder: &str) {
        self.injected.remove(builder);
    }

    /// Whether a failure of `builder` should trigger fallback
    ///
    /// Telemetry showing the builder unhealthy or dead turns any failure
    /// into a trigger.
    #[must_use]
    pub fn detect_trigger(&self, builder: &str, failure: &BuilderFailure) -> Option<FallbackTrigger> {
        trigger_for(self.telemetry.health(builder), failure)
    }

    /// Fallback events for a task, in order
    #[must_use]
    pub fn fallback_log(&self, task_id: &str) -> Vec<FallbackEvent> {
        self.logs.get(task_id).map(|l| l.clone()).unwrap_or_default()
    }

    async fn attempt(&self, builder: &str, context: &FallbackContext) -> Result<BuilderOutput, BuilderFailure> {
        if let Some(reason) = self.injected.get(builder) {
            return Err(BuilderFailure::Simulated(reason.clone()));
        }
        let Some(handle) = self.registry.get(builder) else {
            return Err(BuilderFailure::Unavailable(builder.to_string()));
        };

        let started = Instant::now();
        let result = handle.execute(context).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.telemetry
            .record_task(builder, context.task_id(), result.is_ok(), latency_ms);
        if let Err(failure) = &result {
            self.telemetry
                .record_error(builder, failure.kind(), &failure.to_string());
        }
        result
    }

    async fn log_fallback(&self, task_id: &str, from: &str, to: &str, reason: &BuilderFailure) -> Result<(), ForemanError> {
        let event = FallbackEvent {
            task_id: task_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        };
        self.audit
            .record(
                "builder_fallback",
                Severity::Medium,
                format!("Builder fallback: {from} -> {to}"),
                &event,
            )
            .await?;
        metrics::counter!("foreman_fallbacks_total", "from" => from.to_string(), "to" => to.to_string())
            .increment(1);
        tracing::warn!(task_id, from, to, reason = %event.reason, "falling back");
        self.logs.entry(task_id.to_string()).or_default().push(event);
        Ok(())
    }

    /// Run `primary`, falling back along its chain on transient failure
    ///
    /// # Errors
    /// - [`ForemanError::UnknownBuilder`] if `primary` is not registered
    /// - [`ForemanError::BuilderFailed`] for failures that do not trigger fallback
    /// - [`ForemanError::BuilderNetworkFailure`] when the chain is exhausted
    /// - [`ForemanError::Audit`] if a fallback event cannot be recorded
    pub async fn execute_with_fallback(
        &self,
        primary: &str,
        context: FallbackContext,
    ) -> Result<FallbackResult, ForemanError> {
        if self.registry.get(primary).is_none() {
            return Err(ForemanError::UnknownBuilder(primary.to_string()));
        }

        // judged before this attempt is recorded
        let prior_health = self.telemetry.health(primary);
        let failure = match self.attempt(primary, &context).await {
            Ok(output) => {
                return Ok(FallbackResult {
                    success: true,
                    fallback_used: false,
                    builder_used: primary.to_string(),
                    output,
                    context,
                })
            }
            Err(failure) => failure,
        };

        let Some(trigger) = trigger_for(prior_health, &failure) else {
            return Err(ForemanError::BuilderFailed {
                builder: primary.to_string(),
                failure,
            });
        };
        tracing::info!(builder = primary, ?trigger, "fallback triggered");

        let task_id = context.task_id().to_string();
        let mut context = context.handed_off(&failure);
        let mut attempted = vec![primary.to_string()];
        let mut from = primary.to_string();
        let mut last_failure = failure;

        for next in self.chain_for(primary) {
            self.log_fallback(&task_id, &from, next, &last_failure).await?;
            attempted.push(next.clone());
            match self.attempt(next, &context).await {
                Ok(output) => {
                    tracing::info!(task_id = %task_id, builder = %next, "fallback builder succeeded");
                    return Ok(FallbackResult {
                        success: true,
                        fallback_used: true,
                        builder_used: next.clone(),
                        output,
                        context,
                    });
                }
                Err(f) => {
                    context.error_log.push(format!("{next}: {f}"));
                    from.clone_from(next);
                    last_failure = f;
                }
            }
        }

        metrics::counter!("foreman_builder_network_failures_total").increment(1);
        tracing::error!(task_id = %task_id, ?attempted, last = %last_failure, "all builders failed");
        Err(ForemanError::BuilderNetworkFailure {
            task_id,
            attempted,
            last_failure,
        })
    }
}
