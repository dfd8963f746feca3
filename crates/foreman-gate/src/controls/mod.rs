//! Default implementations of the nine controls
//!
//! | Slot | Control | Checks |
//! |------|---------|--------|
//! | QIEL | [`QaIntegrity`] | quality supremacy over the live QA summary |
//! | CS1 | [`ConstitutionalIntegrity`] | protected files, suppressions, baseline hashes |
//! | CS2 | [`ArchitectureApproval`] | every architecture change approved |
//! | CS3 | [`IncidentFeedback`] | no open incidents against the PR |
//! | CS4 | [`EvidenceCompliance`] | snapshot sealed, intact and complete |
//! | CS5 | [`SecretExposure`] | no secrets in changed files |
//! | CS6 | [`ExecutionBoundary`] | evidence files unchanged since capture |
//! | GSR | [`GovernanceSupremacy`] | zero warnings |
//! | BuildPhilosophy | [`BuildPhilosophyCompliance`] | architecture and Red QA evidence |

mod approval;
mod boundary;
mod compliance;
mod incidents;
mod integrity;
mod philosophy;
mod qiel;
mod secrets;
mod supremacy;

pub use approval::ArchitectureApproval;
pub use boundary::ExecutionBoundary;
pub use compliance::EvidenceCompliance;
pub use incidents::IncidentFeedback;
pub use integrity::{ConstitutionalIntegrity, SUPPRESSION_DIRECTIVES};
pub use philosophy::BuildPhilosophyCompliance;
pub use qiel::QaIntegrity;
pub use secrets::SecretExposure;
pub use supremacy::GovernanceSupremacy;

use crate::result::EvidenceRef;
use foreman_evidence::{ControlName, EvidenceSnapshot};

/// References to every file in a control's bucket
pub(crate) fn bucket_refs(snapshot: &EvidenceSnapshot, control: ControlName) -> Vec<EvidenceRef> {
    snapshot
        .bucket(control)
        .map(|b| {
            b.files
                .iter()
                .map(|f| EvidenceRef {
                    kind: f.kind,
                    path: f.path.clone(),
                    hash: Some(f.hash),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::context::GateContext;
    use foreman_evidence::SnapshotBuilder;

    /// Context over an evidence dir holding `files`
    pub(crate) async fn context_with(files: &[(&str, &str)]) -> (tempfile::TempDir, GateContext) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("evidence");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for (name, body) in files {
            tokio::fs::write(dir.join(name), body).await.unwrap();
        }
        let snapshot = SnapshotBuilder::new().build(7, "abc123", &dir).await.unwrap();
        (tmp, GateContext::new(snapshot))
    }
}
