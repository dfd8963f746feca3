//! Foreman Core - build-to-green orchestration
//!
//! Everything between an accepted build request and a green QA run:
//! - [`CheckpointEngine`]: durable progress at five lifecycle points
//! - [`EscalationDetector`] and [`EscalationHandler`]: when to stop and ask
//! - [`FallbackCoordinator`]: sequential builder fallback with shared context
//! - [`ModelEscalationGovernor`]: budget-governed model tier selection
//! - [`AutonomyController`]: persisted autonomy phase
//! - [`BuildOrchestrator`]: one request, end to end
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman_core::prelude::*;
//!
//! # async fn example(raw: RawBuildRequest, registry: BuilderRegistry) -> Result<(), ForemanError> {
//! let config = ForemanConfig::load("foreman.toml").await?;
//! let coordinator = FallbackCoordinator::new(registry, AuditLogger::default(), Default::default());
//! let orchestrator = BuildOrchestrator::new(
//!     config.clone(),
//!     CheckpointEngine::from_config(&config),
//!     std::sync::Arc::new(coordinator),
//!     EscalationHandler::default(),
//! );
//!
//! match orchestrator.run(&raw, "copilot", &BuildInputs::default()).await? {
//!     BuildOutcome::Completed { iterations, .. } => println!("green after {iterations}"),
//!     BuildOutcome::Escalated { receipt, .. } => println!("escalated: {}", receipt.escalation_id),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod escalation;
pub mod fallback;
pub mod governor;
pub mod orchestrator;
pub mod state;
pub mod telemetry;

pub use checkpoint::{
    Assumptions, Checkpoint, CheckpointEngine, CheckpointSeed, CheckpointStore, FileCheckpointStore, LifecyclePoint,
    MemoryCheckpointStore, QaStatus, ResumePoint,
};
pub use config::ForemanConfig;
pub use error::{CheckpointError, ConfigError, ForemanError, PersistenceError};
pub use escalation::{
    ArchitectureDoc, EscalationChannel, EscalationDetector, EscalationHandler, EscalationReceipt, EscalationRequest,
    EscalationType, IterationRecord, TestExpectation, TestFailure, Verdict,
};
pub use fallback::{
    Builder, BuilderFailure, BuilderOutput, BuilderRegistry, ChangedFile, FallbackContext, FallbackCoordinator,
    FallbackResult,
};
pub use governor::{
    BudgetLimits, BudgetStore, EscalationReason, GovernedEscalationResult, Justification, ModelEscalationGovernor,
    ModelTier, SelectionContext,
};
pub use orchestrator::{BuildInputs, BuildOrchestrator, BuildOutcome};
pub use state::{AutonomyController, AutonomyPhase, AutonomyState, StatePersistence};
pub use telemetry::{BuilderHealth, BuilderTelemetry};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a build
    pub use crate::{
        BuildInputs, BuildOrchestrator, BuildOutcome, Builder, BuilderOutput, BuilderRegistry, CheckpointEngine,
        EscalationHandler, FallbackCoordinator, ForemanConfig, ForemanError,
    };
    pub use foreman_constitutional::{AuditLogger, RawBuildRequest};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
