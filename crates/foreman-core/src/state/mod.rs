//! Autonomy state and its persistence
//!
//! [`StatePersistence`] keeps the current [`AutonomyState`], one file per
//! [`StateTransition`] and one per [`ReauthorizationRequest`].
//! [`AutonomyController`] applies the transition table and blocks builds
//! while autonomy is halted.

mod controller;
mod model;
mod persistence;

pub use controller::AutonomyController;
pub use model::{
    AutonomyPhase, AutonomyState, OwnerApproval, ReauthorizationRequest, StateTransition, SystemState,
};
pub use persistence::StatePersistence;
