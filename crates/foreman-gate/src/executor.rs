//! Sequential gate execution
//!
//! Controls run one at a time in gate order. The first FAIL stops the run,
//! so the result lists only what executed. Merge is allowed only when all
//! nine ran and passed. The whole run, preconditions excluded, is bounded
//! by a deadline; missing it is an error, never a pass.

use crate::context::GateContext;
use crate::control::{ControlSet, GovernanceControl};
use crate::error::GateError;
use crate::result::{ControlResult, GateResult};
use chrono::Utc;
use foreman_constitutional::{AuditLogger, Severity};
use foreman_core::ForemanConfig;
use foreman_evidence::ControlName;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Default deadline for a full run
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GateAudit<'a> {
    pr_number: u64,
    commit_sha: &'a str,
    snapshot_id: &'a str,
    executed: Vec<ControlName>,
    blocked_by: Option<ControlName>,
    merge_allowed: bool,
}

/// Runs a [`ControlSet`] against a [`GateContext`]
#[derive(Debug, Clone)]
pub struct GateExecutor {
    controls: ControlSet,
    timeout: Duration,
    audit: AuditLogger,
}

impl Default for GateExecutor {
    fn default() -> Self {
        Self {
            controls: ControlSet::default(),
            timeout: DEFAULT_GATE_TIMEOUT,
            audit: AuditLogger::default(),
        }
    }
}

impl GateExecutor {
    /// Default controls, 60 second deadline, tracing audit sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor with the configured deadline
    #[must_use]
    pub fn from_config(config: &ForemanConfig) -> Self {
        Self::default().with_timeout(config.gate_timeout())
    }

    /// Replace the whole control set
    #[must_use]
    pub fn with_controls(mut self, controls: ControlSet) -> Self {
        self.controls = controls;
        self
    }

    /// Replace the control in one slot
    #[must_use]
    pub fn with_control(mut self, control: impl GovernanceControl + 'static) -> Self {
        self.controls = self.controls.with_control(control);
        self
    }

    /// With a deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With an audit logger
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Deadline in force
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the gate
    ///
    /// # Errors
    /// - [`GateError::MissingControl`] if a slot is empty
    /// - [`GateError::Snapshot`] if the snapshot fails verification
    /// - [`GateError::DeadlineExceeded`] if the run overruns
    /// - [`GateError::Audit`] if the outcome cannot be recorded
    pub async fn execute(&self, context: &GateContext) -> Result<GateResult, GateError> {
        let missing = self.controls.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
            return Err(GateError::MissingControl(names.join(", ")));
        }

        let snapshot = context.snapshot();
        if let Err(e) = snapshot.verify() {
            tracing::error!(snapshot_id = snapshot.snapshot_id(), error = %e, "gate precondition failed");
            metrics::counter!("foreman_gate_runs_total", "outcome" => "rejected").increment(1);
            return Err(e.into());
        }

        tracing::info!(
            pr = snapshot.pr_number(),
            commit = snapshot.commit_sha(),
            snapshot_id = snapshot.snapshot_id(),
            "governance gate started"
        );
        let started = Instant::now();
        let mut executed = Vec::with_capacity(ControlName::ALL.len());
        let outcome = tokio::time::timeout(self.timeout, self.run_controls(context, &mut executed)).await;
        if outcome.is_err() {
            tracing::error!(
                timeout = ?self.timeout,
                completed = executed.len(),
                "governance gate deadline exceeded"
            );
            metrics::counter!("foreman_gate_runs_total", "outcome" => "timeout").increment(1);
            return Err(GateError::DeadlineExceeded {
                timeout: self.timeout,
                completed: executed.len(),
            });
        }

        let passed = executed.len() == ControlName::ALL.len() && executed.iter().all(ControlResult::passed);
        let violations = executed.iter().flat_map(|c| c.violations.iter().cloned()).collect();
        let result = GateResult {
            pr_number: snapshot.pr_number(),
            commit_sha: snapshot.commit_sha().to_string(),
            snapshot_id: snapshot.snapshot_id().to_string(),
            passed,
            controls: executed,
            violations,
            merge_allowed: passed,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        };

        self.record(&result).await?;
        Ok(result)
    }

    async fn run_controls(&self, context: &GateContext, executed: &mut Vec<ControlResult>) {
        for name in ControlName::ALL {
            let Some(control) = self.controls.get(name) else {
                continue;
            };
            let result = control.validate(context).await;
            tracing::debug!(control = %name, status = %result.status, "control finished");
            let failed = !result.passed();
            executed.push(result);
            if failed {
                break;
            }
        }
    }

    async fn record(&self, result: &GateResult) -> Result<(), GateError> {
        let blocked_by = result.blocking_control().map(|c| c.control_name);
        let outcome = if result.merge_allowed { "pass" } else { "fail" };
        metrics::counter!("foreman_gate_runs_total", "outcome" => outcome).increment(1);
        if let Some(control) = blocked_by {
            metrics::counter!("foreman_gate_blocks_total", "control" => control.as_str()).increment(1);
        }

        let (severity, description) = match blocked_by {
            None => (
                Severity::Info,
                format!("Governance gate passed for PR #{}", result.pr_number),
            ),
            Some(control) => {
                tracing::warn!(
                    pr = result.pr_number,
                    control = %control,
                    violations = result.violations.len(),
                    "merge blocked"
                );
                (
                    Severity::High,
                    format!("Governance gate blocked PR #{} at {control}", result.pr_number),
                )
            }
        };
        let audit = GateAudit {
            pr_number: result.pr_number,
            commit_sha: &result.commit_sha,
            snapshot_id: &result.snapshot_id,
            executed: result.executed(),
            blocked_by,
            merge_allowed: result.merge_allowed,
        };
        self.audit
            .record("governance_gate_executed", severity, description, &audit)
            .await?;
        tracing::info!(
            pr = result.pr_number,
            merge_allowed = result.merge_allowed,
            duration_ms = result.duration_ms,
            "governance gate finished"
        );
        Ok(())
    }
}
