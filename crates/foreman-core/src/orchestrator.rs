//! Build orchestrator
//!
//! Drives one build request to green or to an escalation:
//! - Refuses to start while autonomy is halted
//! - Accepts the request through the protocol gates
//! - Escalates up front on architecture contradictions or gaps
//! - Iterates the builder through the fallback coordinator, checkpointing at
//!   every lifecycle point and scanning every changed file
//! - Completes only on a quality-supreme RED to GREEN transition
//! - Escalates when a detector fires, the builder network fails or the
//!   iteration ceiling is reached
//! - Hands QA reports that are neither red nor green to the Foreman as
//!   constitutional uncertainty

use crate::checkpoint::{Assumptions, Checkpoint, CheckpointEngine, CheckpointSeed, LifecyclePoint, QaStatus};
use crate::config::ForemanConfig;
use crate::error::ForemanError;
use crate::escalation::{
    ArchitectureDoc, EscalationDetails, EscalationDetector, EscalationHandler, EscalationReceipt,
    EscalationRequest, EscalationType, IterationRecord, TestExpectation, Verdict,
};
use crate::fallback::{BuilderOutput, FallbackContext, FallbackCoordinator};
use crate::state::AutonomyController;
use foreman_constitutional::{
    enforce_quality_supremacy, validate_qa_transition, AuditLogger, BuildRequest, ConstitutionalError,
    ProtectedPaths, ProtocolValidator, QaResult, QaSuiteStatus, RawBuildRequest, SecretScanner, Severity,
};
use serde::Serialize;
use std::sync::Arc;

/// Design inputs a build is checked against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildInputs {
    /// Parsed architecture document
    pub architecture: ArchitectureDoc,
    /// What the QA suite asserts
    pub expectations: Vec<TestExpectation>,
    /// Assumptions recorded in every checkpoint
    pub assumptions: Assumptions,
}

/// How a build ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// QA went fully green
    Completed {
        /// Task built
        task_id: String,
        /// Builder that produced the green run
        builder: String,
        /// Iterations used
        iterations: u32,
        /// Final QA run
        qa: QaResult,
        /// Completion checkpoint
        checkpoint: Checkpoint,
    },
    /// Handed to the Foreman
    Escalated {
        /// Delivered escalation
        receipt: EscalationReceipt,
        /// Iterations used
        iterations: u32,
    },
}

impl BuildOutcome {
    /// True for [`BuildOutcome::Completed`]
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Per-build mutable state
struct Run<'a> {
    request: &'a BuildRequest,
    inputs: &'a BuildInputs,
    builder: String,
    context: FallbackContext,
    history: Vec<IterationRecord>,
}

impl Run<'_> {
    fn seed(&self) -> CheckpointSeed<'_> {
        CheckpointSeed {
            task_id: self.request.task_id(),
            builder: &self.builder,
            iteration: self.context.iteration,
            qa_status: self.context.qa_progress,
            assumptions: &self.inputs.assumptions,
        }
    }

    fn details(&self, error_message: impl Into<String>) -> EscalationDetails {
        let suite = self.request.qa_suite();
        EscalationDetails {
            error_message: error_message.into(),
            attempted_fixes: self.context.error_log.clone(),
            architecture_reference: Some(self.request.architecture().reference.clone()),
            qa_suite_reference: suite.location.clone().or_else(|| suite.name.clone()),
            current_qa_status: Some(self.context.qa_progress),
        }
    }
}

/// Runs builds end to end
#[derive(Debug)]
pub struct BuildOrchestrator {
    config: ForemanConfig,
    protocol: ProtocolValidator,
    protected: ProtectedPaths,
    secrets: SecretScanner,
    detector: EscalationDetector,
    checkpoints: CheckpointEngine,
    fallback: Arc<FallbackCoordinator>,
    escalations: EscalationHandler,
    audit: AuditLogger,
    autonomy: Option<Arc<AutonomyController>>,
}

/// Constitutional block found in a builder's changes
struct Blocked {
    kind: &'static str,
    path: String,
    error: ConstitutionalError,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViolationAudit<'a> {
    task_id: &'a str,
    builder: &'a str,
    kind: &'static str,
    path: &'a str,
}

/// Clean report that is neither red nor green
///
/// With nothing failing and not every test passing, 100% passing can be
/// neither confirmed nor refuted.
fn unjudgeable(output: &BuilderOutput) -> Option<Verdict> {
    let qa = &output.qa;
    if output.error.is_some() || qa.status() != QaSuiteStatus::Unknown {
        return None;
    }
    Some(Verdict {
        escalate: true,
        reasons: vec![format!(
            "QA report cannot be judged: {}/{} passing, {} failing, {} skipped",
            qa.passing, qa.total, qa.failing, qa.skipped
        )],
    })
}

impl BuildOrchestrator {
    /// Orchestrator with default validators and the configured detector
    #[must_use]
    pub fn new(
        config: ForemanConfig,
        checkpoints: CheckpointEngine,
        fallback: Arc<FallbackCoordinator>,
        escalations: EscalationHandler,
    ) -> Self {
        Self {
            detector: EscalationDetector::new(config.detector.clone()),
            config,
            protocol: ProtocolValidator::new(),
            protected: ProtectedPaths::default(),
            secrets: SecretScanner::default(),
            checkpoints,
            audit: fallback.audit().clone(),
            fallback,
            escalations,
            autonomy: None,
        }
    }

    /// Refuse builds while the controller's phase forbids them
    #[must_use]
    pub fn with_autonomy(mut self, controller: Arc<AutonomyController>) -> Self {
        self.autonomy = Some(controller);
        self
    }

    /// Record constitutional blocks somewhere other than the fallback coordinator's sink
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Replace the secret scanner
    #[must_use]
    pub fn with_secret_scanner(mut self, scanner: SecretScanner) -> Self {
        self.secrets = scanner;
        self
    }

    /// Replace the protected path table
    #[must_use]
    pub fn with_protected_paths(mut self, paths: ProtectedPaths) -> Self {
        self.protected = paths;
        self
    }

    /// Checkpoint engine
    #[inline]
    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointEngine {
        &self.checkpoints
    }

    /// Fallback coordinator
    #[inline]
    #[must_use]
    pub fn fallback(&self) -> &FallbackCoordinator {
        &self.fallback
    }

    /// Build `raw` with `primary`, falling back and escalating as needed
    ///
    /// # Errors
    /// - [`ForemanError::AutonomyBlocked`] while autonomy is halted
    /// - [`ForemanError::ProtocolViolation`] if the request fails a gate
    /// - [`ForemanError::ConstitutionalViolation`] if a changed file is
    ///   protected or carries a secret, or the final QA transition is invalid
    /// - [`ForemanError::UnknownBuilder`] if `primary` is not registered
    /// - checkpoint, audit and channel failures
    pub async fn run(
        &self,
        raw: &RawBuildRequest,
        primary: &str,
        inputs: &BuildInputs,
    ) -> Result<BuildOutcome, ForemanError> {
        if let Some(autonomy) = &self.autonomy {
            autonomy.ensure_build_allowed()?;
        }

        let request = self.protocol.accept(raw)?;
        if self.fallback.registry().get(primary).is_none() {
            return Err(ForemanError::UnknownBuilder(primary.to_string()));
        }
        tracing::info!(task_id = request.task_id(), builder = primary, "build accepted");
        metrics::counter!("foreman_builds_total").increment(1);

        let mut run = Run {
            request: &request,
            inputs,
            builder: primary.to_string(),
            context: FallbackContext::new(request.clone(), primary),
            history: Vec::new(),
        };

        let preflight = self.preflight(inputs);
        if preflight.escalate {
            return self
                .escalate(&mut run, EscalationType::ArchitecturalAmbiguity, &preflight)
                .await;
        }

        while run.context.iteration < self.config.max_iterations {
            if let Some(outcome) = self.iterate(&mut run).await? {
                return Ok(outcome);
            }
        }

        let reason = format!("iteration ceiling of {} reached", self.config.max_iterations);
        tracing::warn!(task_id = request.task_id(), %reason, "build did not converge");
        let checkpoint = self
            .checkpoints
            .checkpoint(&LifecyclePoint::OnFailure { reason: reason.clone() }, &run.seed())
            .await?;
        run.context.checkpoints.push(checkpoint);
        let verdict = Verdict {
            escalate: true,
            reasons: vec![reason],
        };
        self.escalate(&mut run, EscalationType::NonRecoverableError, &verdict)
            .await
    }

    fn preflight(&self, inputs: &BuildInputs) -> Verdict {
        let contradiction = self
            .detector
            .detect_contradiction(&inputs.architecture, &inputs.expectations);
        if contradiction.escalate {
            return contradiction;
        }
        self.detector.detect_ambiguity(None, &inputs.architecture)
    }

    /// One iteration; `Some` when the build is over
    async fn iterate(&self, run: &mut Run<'_>) -> Result<Option<BuildOutcome>, ForemanError> {
        let checkpoint = self
            .checkpoints
            .checkpoint(&LifecyclePoint::BeforeIteration, &run.seed())
            .await?;
        run.context.checkpoints.push(checkpoint);

        let output = match self
            .fallback
            .execute_with_fallback(&run.builder, run.context.clone())
            .await
        {
            Ok(result) => {
                if result.fallback_used {
                    tracing::info!(from = %run.builder, to = %result.builder_used, "continuing on fallback builder");
                    run.builder = result.builder_used;
                }
                run.context = result.context;
                result.output
            }
            Err(ForemanError::BuilderFailed { builder, failure }) => {
                tracing::debug!(%builder, %failure, "iteration failed without fallback");
                run.context.error_log.push(format!("{builder}: {failure}"));
                let progress = run.context.qa_progress;
                BuilderOutput {
                    qa: QaResult::new(progress.total, progress.passing, progress.failing),
                    error: Some(failure.to_string()),
                    ..BuilderOutput::default()
                }
            }
            Err(ForemanError::BuilderNetworkFailure {
                task_id,
                attempted,
                last_failure,
            }) => {
                let reason = format!("all builders failed: {}", attempted.join(", "));
                let checkpoint = self
                    .checkpoints
                    .checkpoint(&LifecyclePoint::OnFailure { reason: reason.clone() }, &run.seed())
                    .await?;
                run.context.checkpoints.push(checkpoint);
                tracing::error!(%task_id, %last_failure, "escalating builder network failure");
                run.context.error_log.push(last_failure.to_string());
                let verdict = Verdict {
                    escalate: true,
                    reasons: vec![reason],
                };
                return self
                    .escalate(run, EscalationType::NonRecoverableError, &verdict)
                    .await
                    .map(Some);
            }
            Err(other) => return Err(other),
        };
        run.context.iteration += 1;

        if let Some(blocked) = self.scan_changes(&output) {
            let reason = blocked.error.to_string();
            let checkpoint = self
                .checkpoints
                .checkpoint(&LifecyclePoint::OnFailure { reason }, &run.seed())
                .await?;
            run.context.checkpoints.push(checkpoint);
            self.record_block(run, &blocked).await?;
            return Err(blocked.error.into());
        }

        run.context.qa_progress = QaStatus::new(output.qa.total, output.qa.passing, output.qa.failing);
        let checkpoint = self
            .checkpoints
            .checkpoint(&LifecyclePoint::AfterQa, &run.seed())
            .await?;
        run.context.checkpoints.push(checkpoint);

        if let Some(verdict) = unjudgeable(&output) {
            tracing::warn!(task_id = run.request.task_id(), reasons = ?verdict.reasons, "QA report cannot be judged");
            return self
                .escalate(run, EscalationType::ConstitutionalUncertainty, &verdict)
                .await
                .map(Some);
        }

        if output.qa.status() == QaSuiteStatus::Green {
            let decision = enforce_quality_supremacy(&output.qa);
            if decision.build_allowed {
                return self.complete(run, output.qa).await.map(Some);
            }
            let reason = decision.reason.unwrap_or_default();
            tracing::info!(%reason, "tests green but quality not supreme");
            run.context.error_log.push(reason);
        } else if let Some(error) = &output.error {
            run.context.error_log.push(error.clone());
        }

        run.history.push(IterationRecord {
            iteration: run.context.iteration,
            passing: output.qa.passing,
            failing: output.qa.failing,
        });

        let detections = [
            (
                EscalationType::NonRecoverableError,
                self.detector
                    .detect_impossible_qa(output.qa.failing, &output.failures, run.context.iteration),
            ),
            (
                EscalationType::NonRecoverableError,
                self.detector.should_escalate_after_retries(&run.history),
            ),
            (
                EscalationType::ArchitecturalAmbiguity,
                self.detector
                    .detect_ambiguity(output.error.as_deref(), &run.inputs.architecture),
            ),
        ];
        for (escalation_type, verdict) in detections {
            if verdict.escalate {
                return self.escalate(run, escalation_type, &verdict).await.map(Some);
            }
        }
        Ok(None)
    }

    fn scan_changes(&self, output: &BuilderOutput) -> Option<Blocked> {
        let paths: Vec<&str> = output.changed_files.iter().map(|f| f.path.as_str()).collect();
        if let Err(error) = self.protected.validate(paths.as_slice()) {
            let path = match &error {
                ConstitutionalError::ProtectedPath { paths: protected, .. } => protected.join(", "),
                _ => paths.join(", "),
            };
            return Some(Blocked {
                kind: "protected_path",
                path,
                error,
            });
        }
        output.changed_files.iter().find_map(|file| {
            self.secrets.check(&file.content).err().map(|error| Blocked {
                kind: "secret",
                path: file.path.clone(),
                error,
            })
        })
    }

    async fn record_block(&self, run: &Run<'_>, blocked: &Blocked) -> Result<(), ForemanError> {
        tracing::error!(
            task_id = run.request.task_id(),
            kind = blocked.kind,
            path = %blocked.path,
            "constitutional violation in builder changes"
        );
        self.audit
            .record(
                "constitutional_violation",
                Severity::Critical,
                format!("Builder {} blocked: {} in {}", run.builder, blocked.kind, blocked.path),
                &ViolationAudit {
                    task_id: run.request.task_id(),
                    builder: &run.builder,
                    kind: blocked.kind,
                    path: &blocked.path,
                },
            )
            .await?;
        Ok(())
    }

    async fn complete(&self, run: &Run<'_>, qa: QaResult) -> Result<BuildOutcome, ForemanError> {
        validate_qa_transition(run.request.qa_suite().current_status, qa.status(), qa.failing)?;
        let checkpoint = self
            .checkpoints
            .checkpoint(&LifecyclePoint::OnCompletion, &run.seed())
            .await?;
        metrics::counter!("foreman_builds_completed_total").increment(1);
        tracing::info!(
            task_id = run.request.task_id(),
            builder = %run.builder,
            iterations = run.context.iteration,
            total = qa.total,
            "build green"
        );
        Ok(BuildOutcome::Completed {
            task_id: run.request.task_id().to_string(),
            builder: run.builder.clone(),
            iterations: run.context.iteration,
            qa,
            checkpoint,
        })
    }

    async fn escalate(
        &self,
        run: &mut Run<'_>,
        escalation_type: EscalationType,
        verdict: &Verdict,
    ) -> Result<BuildOutcome, ForemanError> {
        let issue = verdict.reasons.join("; ");
        let checkpoint = self
            .checkpoints
            .checkpoint(&LifecyclePoint::BeforeEscalation { reason: issue.clone() }, &run.seed())
            .await?;
        run.context.checkpoints.push(checkpoint);

        let request = EscalationRequest::new(escalation_type, run.builder.clone(), run.request.task_id(), issue.clone())
            .with_details(run.details(issue));
        let receipt = self.escalations.escalate(request).await?;
        Ok(BuildOutcome::Escalated {
            receipt,
            iterations: run.context.iteration,
        })
    }
}
