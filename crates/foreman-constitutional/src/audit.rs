//! Governance audit trail
//!
//! Events are stamped with an id and timestamp and handed to a
//! [`GovernanceSink`]. A sink failure is returned to the caller and logged
//! with the full event, so nothing is dropped silently.

use crate::error::ConstitutionalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Critical
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// One governance audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceEvent {
    /// Unique id
    pub id: Uuid,
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
    /// Event type, e.g. `builder_fallback`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub description: String,
    /// Typed payload, serialized
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl GovernanceEvent {
    /// New event stamped with a fresh id and the current time
    pub fn new(event_type: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            severity,
            description: description.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach a serializable payload
    ///
    /// A payload that fails to serialize is recorded as its error string.
    #[must_use]
    pub fn with_metadata<T: Serialize>(mut self, metadata: &T) -> Self {
        self.metadata = serde_json::to_value(metadata)
            .unwrap_or_else(|e| serde_json::json!({ "serialization_error": e.to_string() }));
        self
    }
}

/// Sink errors
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Destination for governance events (governance memory, audit store)
#[async_trait]
pub trait GovernanceSink: Send + Sync {
    /// Persist one event
    async fn write(&self, event: &GovernanceEvent) -> Result<(), SinkError>;
}

/// Sink that only emits structured tracing records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl GovernanceSink for TracingSink {
    async fn write(&self, event: &GovernanceEvent) -> Result<(), SinkError> {
        tracing::info!(
            target: "governance",
            id = %event.id,
            event_type = %event.event_type,
            severity = %event.severity,
            metadata = %event.metadata,
            "{}",
            event.description
        );
        Ok(())
    }
}

/// In-memory sink, for tests and local inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<GovernanceEvent>>,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event written
    #[must_use]
    pub fn events(&self) -> Vec<GovernanceEvent> {
        self.events.lock().clone()
    }

    /// Events of one type
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<GovernanceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GovernanceSink for MemorySink {
    async fn write(&self, event: &GovernanceEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Stamps and forwards governance events
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn GovernanceSink>,
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl AuditLogger {
    /// Logger writing to `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn GovernanceSink>) -> Self {
        Self { sink }
    }

    /// Build, stamp and write an event; returns the written event
    ///
    /// # Errors
    /// [`ConstitutionalError::AuditSink`] if the sink refuses the event
    pub async fn record<T: Serialize>(
        &self,
        event_type: &str,
        severity: Severity,
        description: impl Into<String>,
        metadata: &T,
    ) -> Result<GovernanceEvent, ConstitutionalError> {
        let event = GovernanceEvent::new(event_type, severity, description).with_metadata(metadata);
        self.log(&event).await?;
        Ok(event)
    }

    /// Write a pre-built event
    ///
    /// # Errors
    /// [`ConstitutionalError::AuditSink`] if the sink refuses the event
    pub async fn log(&self, event: &GovernanceEvent) -> Result<(), ConstitutionalError> {
        if let Err(e) = self.sink.write(event).await {
            tracing::error!(
                id = %event.id,
                event_type = %event.event_type,
                event = ?event,
                error = %e,
                "governance sink rejected audit event"
            );
            return Err(ConstitutionalError::AuditSink {
                event_id: event.id.to_string(),
                message: e.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl GovernanceSink for FailingSink {
        async fn write(&self, _event: &GovernanceEvent) -> Result<(), SinkError> {
            Err(SinkError("disk full".into()))
        }
    }

    #[tokio::test]
    async fn record_stamps_and_writes() {
        let sink = Arc::new(MemorySink::new());
        let logger = AuditLogger::new(sink.clone());
        let event = logger
            .record("builder_fallback", Severity::Medium, "copilot -> local", &serde_json::json!({"from": "copilot"}))
            .await
            .unwrap();

        let stored = sink.events_of_type("builder_fallback");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, event.id);
        assert_eq!(stored[0].metadata["from"], "copilot");
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let a = GovernanceEvent::new("x", Severity::Info, "a");
        let b = GovernanceEvent::new("x", Severity::Info, "b");
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn sink_failure_surfaces() {
        let logger = AuditLogger::new(Arc::new(FailingSink));
        let err = logger
            .record("escalation_forbidden", Severity::High, "denied", &())
            .await
            .unwrap_err();
        assert!(matches!(err, ConstitutionalError::AuditSink { ref message, .. } if message == "disk full"));
    }

    #[test]
    fn wire_type_field() {
        let json = serde_json::to_value(GovernanceEvent::new("t", Severity::Critical, "d")).unwrap();
        assert_eq!(json["type"], "t");
        assert_eq!(json["severity"], "critical");
    }
}
