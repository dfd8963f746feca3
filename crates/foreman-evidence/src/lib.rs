//! Foreman Evidence
//!
//! Immutable, content-hashed evidence snapshots for governance validation.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: SHA-256 digest used for files and whole snapshots
//! - [`ControlName`]: the nine governance controls, in gate order
//! - [`EvidenceSnapshot`]: sealed snapshot; every mutation entry point fails
//! - [`SnapshotBuilder`]: walks an evidence directory and seals a snapshot
//! - [`SnapshotStore`]: persists snapshots and re-validates them on load
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman_evidence::{SnapshotBuilder, SnapshotStore};
//!
//! let snapshot = SnapshotBuilder::new().build(42, "abc123", evidence_dir).await?;
//! let store = SnapshotStore::new("snapshots");
//! store.save(&snapshot).await?;
//! let reloaded = store.load(snapshot.snapshot_id()).await?; // hash re-checked
//! ```

#![warn(unreachable_pub)]

mod builder;
mod classify;
mod control;
mod error;
mod hash;
mod snapshot;
mod store;

pub use builder::{SnapshotBuilder, DRY_RUN_NOTE};
pub use classify::{Classification, ClassificationRule, EvidenceClassifier, UnmatchedEvidence};
pub use control::{ControlName, UnknownControl};
pub use error::SnapshotError;
pub use hash::{ContentHash, HashError};
pub use snapshot::{BucketMetadata, Completeness, EvidenceBucket, EvidenceFile, EvidenceKind, EvidenceSnapshot};
pub use store::{verify_evidence_file, verify_snapshot_files, FileIntegrity, SnapshotStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
