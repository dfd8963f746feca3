//! Sending escalations to the Foreman

use super::request::{EscalationRequest, EscalationType};
use crate::error::ForemanError;
use async_trait::async_trait;
use foreman_constitutional::{AuditLogger, Severity};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;
use uuid::Uuid;

/// Channel refused the escalation
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ChannelError(pub String);

/// Where escalations go (Foreman inbox, human queue)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EscalationChannel: Send + Sync {
    /// Deliver one escalation
    async fn send(&self, escalation_id: &str, request: &EscalationRequest) -> Result<(), ChannelError>;
}

/// Channel that records to tracing only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl EscalationChannel for LogChannel {
    async fn send(&self, escalation_id: &str, request: &EscalationRequest) -> Result<(), ChannelError> {
        tracing::warn!(
            escalation_id,
            escalation_type = %request.escalation_type,
            builder = %request.builder,
            task_id = %request.task_id,
            "{}",
            request.issue
        );
        Ok(())
    }
}

/// Acknowledgement for a delivered escalation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationReceipt {
    /// `esc-` prefixed id
    pub escalation_id: String,
    /// Governance event recorded for it
    pub event_id: Uuid,
    /// The request as delivered
    pub request: EscalationRequest,
}

#[derive(Serialize)]
struct EscalationEventMetadata<'a> {
    escalation_id: &'a str,
    escalation_type: EscalationType,
    task_id: &'a str,
    details: &'a super::request::EscalationDetails,
    suggested_resolution: Option<&'a str>,
}

/// Records and delivers escalations
#[derive(Clone)]
pub struct EscalationHandler {
    audit: AuditLogger,
    channel: Arc<dyn EscalationChannel>,
}

impl fmt::Debug for EscalationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscalationHandler")
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

impl Default for EscalationHandler {
    fn default() -> Self {
        Self::new(AuditLogger::default(), Arc::new(LogChannel))
    }
}

fn severity_for(escalation_type: EscalationType) -> Severity {
    match escalation_type {
        EscalationType::NonRecoverableError => Severity::High,
        EscalationType::ArchitecturalAmbiguity => Severity::Medium,
        EscalationType::ConstitutionalUncertainty => Severity::Critical,
    }
}

impl EscalationHandler {
    /// Handler over an audit logger and a channel
    #[must_use]
    pub fn new(audit: AuditLogger, channel: Arc<dyn EscalationChannel>) -> Self {
        Self { audit, channel }
    }

    /// Stamp, audit and deliver an escalation
    ///
    /// The governance event is written before delivery, so a channel outage
    /// still leaves a record.
    ///
    /// # Errors
    /// [`ForemanError::Audit`] if the event cannot be recorded,
    /// [`ForemanError::EscalationChannel`] if delivery fails
    pub async fn escalate(&self, request: EscalationRequest) -> Result<EscalationReceipt, ForemanError> {
        let escalation_id = format!("esc-{}", Ulid::new().to_string().to_lowercase());

        let metadata = EscalationEventMetadata {
            escalation_id: &escalation_id,
            escalation_type: request.escalation_type,
            task_id: &request.task_id,
            details: &request.details,
            suggested_resolution: request.suggested_resolution.as_deref(),
        };
        let event = self
            .audit
            .record(
                "builder_escalation",
                severity_for(request.escalation_type),
                format!("Builder {} escalating: {}", request.builder, request.issue),
                &metadata,
            )
            .await?;

        self.channel
            .send(&escalation_id, &request)
            .await
            .map_err(|e| ForemanError::EscalationChannel(e.0))?;

        metrics::counter!("foreman_escalations_total", "type" => request.escalation_type.as_str()).increment(1);
        tracing::info!(
            %escalation_id,
            escalation_type = %request.escalation_type,
            builder = %request.builder,
            task_id = %request.task_id,
            "escalated to foreman"
        );

        Ok(EscalationReceipt {
            escalation_id,
            event_id: event.id,
            request,
        })
    }
}
