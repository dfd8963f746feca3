//! Sequential builder fallback with shared context

use foreman_constitutional::{AuditLogger, MemorySink};
use foreman_core::{BuilderFailure, BuilderRegistry, FallbackContext, FallbackCoordinator, ForemanError};
use foreman_core::telemetry::BuilderTelemetry;
use foreman_test_utils::{init_tracing, qa_output, validated_request, FailingBuilder, ScriptedBuilder};
use std::sync::Arc;

struct Fixture {
    coordinator: FallbackCoordinator,
    sink: Arc<MemorySink>,
}

fn fixture(builders: Vec<Arc<dyn foreman_core::Builder>>) -> Fixture {
    let registry = BuilderRegistry::new();
    for builder in builders {
        registry.register(builder);
    }
    let sink = Arc::new(MemorySink::new());
    let coordinator = FallbackCoordinator::new(
        registry,
        AuditLogger::new(sink.clone()),
        Arc::new(BuilderTelemetry::new()),
    );
    Fixture { coordinator, sink }
}

#[tokio::test]
async fn copilot_timeout_hands_off_to_local() {
    init_tracing();
    let copilot = Arc::new(FailingBuilder::new("copilot", BuilderFailure::Timeout { secs: 300 }));
    let local = Arc::new(ScriptedBuilder::new("local", [Ok(qa_output(10, 10))]));
    let f = fixture(vec![copilot.clone(), local.clone()]);

    let context = FallbackContext::new(validated_request(), "copilot");
    let result = f.coordinator.execute_with_fallback("copilot", context).await.unwrap();

    assert!(result.success);
    assert!(result.fallback_used);
    assert_eq!(result.builder_used, "local");
    assert_eq!(result.context.primary_builder, "copilot");
    assert_eq!(result.context.primary_error, Some(BuilderFailure::Timeout { secs: 300 }));
    assert_eq!(copilot.calls(), 1);
    assert_eq!(local.calls(), 1);

    let log = f.coordinator.fallback_log("task-001");
    assert_eq!(log.len(), 1);
    assert_eq!((log[0].from.as_str(), log[0].to.as_str()), ("copilot", "local"));
    assert_eq!(f.sink.events_of_type("builder_fallback").len(), 1);
}

#[tokio::test]
async fn application_error_does_not_fall_back() {
    let copilot = Arc::new(FailingBuilder::new("copilot", BuilderFailure::Application("type error".into())));
    let local = Arc::new(ScriptedBuilder::new("local", [Ok(qa_output(10, 10))]));
    let f = fixture(vec![copilot, local.clone()]);

    let context = FallbackContext::new(validated_request(), "copilot");
    let err = f.coordinator.execute_with_fallback("copilot", context).await.unwrap_err();

    assert!(matches!(err, ForemanError::BuilderFailed { ref builder, .. } if builder == "copilot"));
    assert_eq!(local.calls(), 0);
    assert!(f.sink.events().is_empty());
}

#[tokio::test]
async fn exhausted_chain_is_a_network_failure() {
    let ui = Arc::new(FailingBuilder::new("ui", BuilderFailure::Unhealthy("oom".into())));
    let copilot = Arc::new(FailingBuilder::new("copilot", BuilderFailure::TokenExhaustion));
    let local = Arc::new(FailingBuilder::new("local", BuilderFailure::Unavailable("offline".into())));
    let f = fixture(vec![ui, copilot, local]);

    let context = FallbackContext::new(validated_request(), "ui");
    let err = f.coordinator.execute_with_fallback("ui", context).await.unwrap_err();

    match err {
        ForemanError::BuilderNetworkFailure {
            attempted, last_failure, ..
        } => {
            assert_eq!(attempted, vec!["ui", "copilot", "local"]);
            assert_eq!(last_failure, BuilderFailure::Unavailable("offline".into()));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(f.coordinator.fallback_log("task-001").len(), 2);
}

#[tokio::test]
async fn every_failed_builder_lands_in_the_error_log() {
    let ui = Arc::new(FailingBuilder::new("ui", BuilderFailure::Unhealthy("oom".into())));
    let copilot = Arc::new(FailingBuilder::new("copilot", BuilderFailure::TokenExhaustion));
    let local = Arc::new(ScriptedBuilder::new("local", [Ok(qa_output(10, 10))]));
    let f = fixture(vec![ui, copilot, local.clone()]);

    let context = FallbackContext::new(validated_request(), "ui");
    let result = f.coordinator.execute_with_fallback("ui", context).await.unwrap();

    assert_eq!(result.builder_used, "local");
    assert_eq!(
        result.context.error_log,
        vec![
            format!("ui: {}", BuilderFailure::Unhealthy("oom".into())),
            format!("copilot: {}", BuilderFailure::TokenExhaustion),
        ]
    );
    assert_eq!(local.calls(), 1);
}

#[tokio::test]
async fn injected_failure_triggers_fallback() {
    let copilot = Arc::new(ScriptedBuilder::new("copilot", [Ok(qa_output(10, 10))]));
    let local = Arc::new(ScriptedBuilder::new("local", [Ok(qa_output(10, 10))]));
    let f = fixture(vec![copilot.clone(), local]);
    f.coordinator.inject_failure("copilot", "chaos drill");

    let context = FallbackContext::new(validated_request(), "copilot");
    let result = f.coordinator.execute_with_fallback("copilot", context).await.unwrap();

    assert_eq!(result.builder_used, "local");
    assert_eq!(copilot.calls(), 0);

    f.coordinator.clear_injected_failure("copilot");
    let context = FallbackContext::new(validated_request(), "copilot");
    let result = f.coordinator.execute_with_fallback("copilot", context).await.unwrap();
    assert!(!result.fallback_used);
}
