//! Foreman Governance Gate
//!
//! The last check before merge. Nine controls run in fixed order against a
//! sealed evidence snapshot plus live repository state:
//!
//! `QIEL, CS1, CS2, CS3, CS4, CS5, CS6, GSR, BuildPhilosophy`
//!
//! - [`GateContext`]: snapshot, QA summary, changed files, approvals, incidents
//! - [`GovernanceControl`]: one replaceable control; [`ControlSet`] holds nine
//! - [`GateExecutor`]: sequential, first FAIL stops the run, bounded by a deadline
//! - [`GateResult`]: executed controls, violations, merge decision, markdown report
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman_gate::prelude::*;
//!
//! let snapshot = SnapshotBuilder::new().build(123, "abc123", evidence_dir).await?;
//! let context = GateContext::new(snapshot).with_qa(QaResult::all_green(303));
//! let result = GateExecutor::from_config(&config).execute(&context).await?;
//! println!("{}", result.report_markdown());
//! std::process::exit(if result.merge_allowed { 0 } else { 1 });
//! ```

#![warn(unreachable_pub)]

pub mod context;
pub mod control;
pub mod controls;
pub mod error;
pub mod executor;
pub mod report;
pub mod result;

pub use context::{ArchitectureChange, GateContext, Incident};
pub use control::{ControlSet, GovernanceControl};
pub use error::GateError;
pub use executor::{GateExecutor, DEFAULT_GATE_TIMEOUT};
pub use report::render_markdown;
pub use result::{ControlResult, ControlStatus, EvidenceRef, GateResult, Violation};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the gate
    pub use crate::{ControlResult, ControlSet, GateContext, GateError, GateExecutor, GateResult, GovernanceControl};
    pub use foreman_constitutional::QaResult;
    pub use foreman_evidence::{ControlName, SnapshotBuilder};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
