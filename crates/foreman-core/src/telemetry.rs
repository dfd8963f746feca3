//! Builder health telemetry
//!
//! Tracks recent outcomes per builder and derives a [`BuilderHealth`]. The
//! fallback coordinator consults it: an unhealthy or dead builder triggers
//! fallback even for failures that would not on their own.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

const HISTORY_LIMIT: usize = 100;
const HEALTH_WINDOW: usize = 10;
const DEAD_AFTER_SECS: i64 = 300;
const UNHEALTHY_ERROR_RATE: f64 = 0.5;
const DEGRADED_ERROR_RATE: f64 = 0.2;
const UNHEALTHY_LATENCY_MS: f64 = 10_000.0;
const DEGRADED_LATENCY_MS: f64 = 5_000.0;

/// Derived builder health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderHealth {
    /// Working normally
    Healthy,
    /// Elevated errors or latency
    Degraded,
    /// Too many errors or too slow to use
    Unhealthy,
    /// No heartbeat for five minutes
    Dead,
}

impl BuilderHealth {
    /// True for unhealthy and dead builders
    #[inline]
    #[must_use]
    pub fn is_unusable(self) -> bool {
        matches!(self, Self::Unhealthy | Self::Dead)
    }
}

impl fmt::Display for BuilderHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Dead => "dead",
        })
    }
}

/// Health snapshot with the numbers behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Builder name
    pub builder: String,
    /// Derived status
    pub status: BuilderHealth,
    /// Failed share of the last ten tasks
    pub error_rate: f64,
    /// Mean latency over retained samples
    pub avg_latency_ms: f64,
    /// Whether the most recent task succeeded
    pub recent_success: bool,
    /// Most recent error message
    pub last_error: Option<String>,
    /// When the report was computed
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    task_id: String,
    success: bool,
}

#[derive(Debug, Clone)]
struct ErrorRecord {
    kind: String,
    message: String,
}

#[derive(Debug, Clone)]
struct BuilderMetrics {
    last_heartbeat: DateTime<Utc>,
    last_task_id: Option<String>,
    tasks: VecDeque<TaskRecord>,
    errors: VecDeque<ErrorRecord>,
    latencies: VecDeque<u64>,
}

impl BuilderMetrics {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat: now,
            last_task_id: None,
            tasks: VecDeque::new(),
            errors: VecDeque::new(),
            latencies: VecDeque::new(),
        }
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T) {
    if queue.len() == HISTORY_LIMIT {
        queue.pop_front();
    }
    queue.push_back(item);
}

/// Per-builder outcome tracking
#[derive(Debug, Default)]
pub struct BuilderTelemetry {
    builders: DashMap<String, BuilderMetrics>,
}

impl BuilderTelemetry {
    /// Empty telemetry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the builder alive
    pub fn heartbeat(&self, builder: &str) {
        self.heartbeat_at(builder, Utc::now());
    }

    /// Mark the builder alive at a given time
    pub fn heartbeat_at(&self, builder: &str, at: DateTime<Utc>) {
        self.builders
            .entry(builder.to_string())
            .or_insert_with(|| BuilderMetrics::new(at))
            .last_heartbeat = at;
    }

    /// Record a finished task; also counts as a heartbeat
    pub fn record_task(&self, builder: &str, task_id: &str, success: bool, latency_ms: u64) {
        let now = Utc::now();
        let mut metrics = self
            .builders
            .entry(builder.to_string())
            .or_insert_with(|| BuilderMetrics::new(now));
        metrics.last_heartbeat = now;
        metrics.last_task_id = Some(task_id.to_string());
        push_bounded(
            &mut metrics.tasks,
            TaskRecord {
                task_id: task_id.to_string(),
                success,
            },
        );
        push_bounded(&mut metrics.latencies, latency_ms);
    }

    /// Record an error
    pub fn record_error(&self, builder: &str, kind: &str, message: &str) {
        let now = Utc::now();
        let mut metrics = self
            .builders
            .entry(builder.to_string())
            .or_insert_with(|| BuilderMetrics::new(now));
        push_bounded(
            &mut metrics.errors,
            ErrorRecord {
                kind: kind.to_string(),
                message: message.to_string(),
            },
        );
        tracing::debug!(builder, kind, message, "builder error recorded");
    }

    /// Last task a builder handled
    #[must_use]
    pub fn last_task(&self, builder: &str) -> Option<String> {
        self.builders.get(builder).and_then(|m| m.last_task_id.clone())
    }

    /// Error counts by kind
    #[must_use]
    pub fn error_counts(&self, builder: &str) -> Vec<(String, usize)> {
        let Some(metrics) = self.builders.get(builder) else {
            return Vec::new();
        };
        let mut counts: Vec<(String, usize)> = Vec::new();
        for error in &metrics.errors {
            match counts.iter_mut().find(|(k, _)| *k == error.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((error.kind.clone(), 1)),
            }
        }
        counts
    }

    /// Health status now
    #[must_use]
    pub fn health(&self, builder: &str) -> BuilderHealth {
        self.report_at(builder, Utc::now()).status
    }

    /// Full health report as of `now`
    ///
    /// Builders never seen are reported healthy.
    #[must_use]
    pub fn report_at(&self, builder: &str, now: DateTime<Utc>) -> HealthReport {
        let Some(metrics) = self.builders.get(builder) else {
            return HealthReport {
                builder: builder.to_string(),
                status: BuilderHealth::Healthy,
                error_rate: 0.0,
                avg_latency_ms: 0.0,
                recent_success: false,
                last_error: None,
                timestamp: now,
            };
        };

        let recent: Vec<&TaskRecord> = metrics.tasks.iter().rev().take(HEALTH_WINDOW).collect();
        #[allow(clippy::cast_precision_loss)]
        let error_rate = if recent.is_empty() {
            0.0
        } else {
            recent.iter().filter(|t| !t.success).count() as f64 / recent.len() as f64
        };
        #[allow(clippy::cast_precision_loss)]
        let avg_latency_ms = if metrics.latencies.is_empty() {
            0.0
        } else {
            metrics.latencies.iter().sum::<u64>() as f64 / metrics.latencies.len() as f64
        };

        let status = if now - metrics.last_heartbeat > Duration::seconds(DEAD_AFTER_SECS) {
            BuilderHealth::Dead
        } else if error_rate > UNHEALTHY_ERROR_RATE || avg_latency_ms > UNHEALTHY_LATENCY_MS {
            BuilderHealth::Unhealthy
        } else if error_rate > DEGRADED_ERROR_RATE || avg_latency_ms > DEGRADED_LATENCY_MS {
            BuilderHealth::Degraded
        } else {
            BuilderHealth::Healthy
        };

        HealthReport {
            builder: builder.to_string(),
            status,
            error_rate,
            avg_latency_ms,
            recent_success: recent.first().is_some_and(|t| t.success),
            last_error: metrics.errors.back().map(|e| e.message.clone()),
            timestamp: now,
        }
    }

    /// Task ids retained for a builder, oldest first
    #[must_use]
    pub fn task_history(&self, builder: &str) -> Vec<String> {
        self.builders
            .get(builder)
            .map(|m| m.tasks.iter().map(|t| t.task_id.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_builder_is_healthy() {
        assert_eq!(BuilderTelemetry::new().health("copilot"), BuilderHealth::Healthy);
    }

    #[test]
    fn error_rate_thresholds() {
        let telemetry = BuilderTelemetry::new();
        for i in 0..10 {
            telemetry.record_task("copilot", &format!("t{i}"), i >= 3, 100);
        }
        assert_eq!(telemetry.health("copilot"), BuilderHealth::Degraded);

        for i in 0..6 {
            telemetry.record_task("copilot", &format!("f{i}"), false, 100);
        }
        assert_eq!(telemetry.health("copilot"), BuilderHealth::Unhealthy);
        assert!(telemetry.health("copilot").is_unusable());
    }

    #[test]
    fn latency_thresholds() {
        let telemetry = BuilderTelemetry::new();
        telemetry.record_task("local", "t1", true, 6_000);
        assert_eq!(telemetry.health("local"), BuilderHealth::Degraded);
        telemetry.record_task("local", "t2", true, 20_000);
        assert_eq!(telemetry.health("local"), BuilderHealth::Unhealthy);
    }

    #[test]
    fn stale_heartbeat_is_dead() {
        let telemetry = BuilderTelemetry::new();
        let long_ago = Utc::now() - Duration::seconds(301);
        telemetry.heartbeat_at("ui", long_ago);
        assert_eq!(telemetry.health("ui"), BuilderHealth::Dead);
        telemetry.heartbeat("ui");
        assert_eq!(telemetry.health("ui"), BuilderHealth::Healthy);
    }

    #[test]
    fn history_is_bounded() {
        let telemetry = BuilderTelemetry::new();
        for i in 0..150 {
            telemetry.record_task("qa", &format!("t{i}"), true, 1);
        }
        let history = telemetry.task_history("qa");
        assert_eq!(history.len(), 100);
        assert_eq!(history[0], "t50");
        assert_eq!(telemetry.last_task("qa").as_deref(), Some("t149"));
    }

    #[test]
    fn report_details() {
        let telemetry = BuilderTelemetry::new();
        telemetry.record_task("api", "t1", true, 100);
        telemetry.record_error("api", "timeout", "took too long");
        telemetry.record_error("api", "timeout", "again");
        let report = telemetry.report_at("api", Utc::now());
        assert!(report.recent_success);
        assert_eq!(report.last_error.as_deref(), Some("again"));
        assert_eq!(telemetry.error_counts("api"), vec![("timeout".to_string(), 2)]);
    }
}
