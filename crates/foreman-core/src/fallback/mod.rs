//! Multi-builder fallback
//!
//! - [`Builder`]: a builder agent behind an async trait
//! - [`BuilderRegistry`]: builders by name
//! - [`FallbackContext`]: state handed unchanged from builder to builder
//! - [`FallbackCoordinator`]: sequential fallback along a static chain table

mod builder;
mod context;
mod coordinator;

pub use builder::{Builder, BuilderFailure, BuilderOutput, BuilderRegistry, ChangedFile};
pub use context::FallbackContext;
pub use coordinator::{default_chains, FallbackCoordinator, FallbackEvent, FallbackResult, FallbackTrigger};
