//! Escalation detection and delivery
//!
//! [`EscalationDetector`] decides when a builder must stop and ask for help;
//! [`EscalationHandler`] records the request and hands it to the Foreman.

mod detector;
mod handler;
mod request;

pub use detector::{
    ArchitectureDoc, DetectorConfig, EscalationDetector, IterationRecord, TestExpectation, TestFailure, Verdict,
};
pub use handler::{ChannelError, EscalationChannel, EscalationHandler, EscalationReceipt, LogChannel};
pub use request::{EscalationDetails, EscalationRequest, EscalationType};
