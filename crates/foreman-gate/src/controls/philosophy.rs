//! Build Philosophy: architecture first, then Red QA, then build to green
//!
//! Looks across every captured evidence file, not just the bucket, since
//! architecture documents are usually named after what they describe.

use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::result::{ControlResult, EvidenceRef, Violation};
use async_trait::async_trait;
use foreman_constitutional::Severity;
use foreman_evidence::{ControlName, EvidenceFile};

const ARCHITECTURE_MARKERS: &[&str] = &["architecture"];
const RED_QA_MARKERS: &[&str] = &["red-qa", "red_qa", "redqa"];

/// Build Philosophy control
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildPhilosophyCompliance;

fn file_name(file: &EvidenceFile) -> String {
    std::path::Path::new(&file.path)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn find<'a>(files: &[&'a EvidenceFile], markers: &[&str]) -> Vec<&'a EvidenceFile> {
    files
        .iter()
        .copied()
        .filter(|f| {
            let name = file_name(f);
            markers.iter().any(|m| name.contains(m))
        })
        .collect()
}

#[async_trait]
impl GovernanceControl for BuildPhilosophyCompliance {
    fn name(&self) -> ControlName {
        ControlName::BuildPhilosophy
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let files: Vec<&EvidenceFile> = context.snapshot().files().collect();
        let architecture = find(&files, ARCHITECTURE_MARKERS);
        let red_qa = find(&files, RED_QA_MARKERS);

        let mut violations = Vec::new();
        if architecture.is_empty() {
            violations.push(Violation::new(
                "BUILD_PHILOSOPHY_ARCHITECTURE_MISSING",
                "Architecture document not found in evidence",
                Severity::High,
            ));
        }
        if red_qa.is_empty() {
            violations.push(Violation::new(
                "BUILD_PHILOSOPHY_RED_QA_MISSING",
                "Red QA evidence not found; QA must exist and fail before the build",
                Severity::High,
            ));
        }

        let evidence = architecture
            .into_iter()
            .chain(red_qa)
            .map(|f| EvidenceRef {
                kind: f.kind,
                path: f.path.clone(),
                hash: Some(f.hash),
            })
            .collect();
        ControlResult::from_violations(
            ControlName::BuildPhilosophy,
            Severity::High,
            evidence,
            violations,
            "Architecture and Red QA preceded the build",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::context_with;

    #[tokio::test]
    async fn both_artifacts_required() {
        let (_tmp, ctx) = context_with(&[("architecture.md", "# design")]).await;
        let result = BuildPhilosophyCompliance.validate(&ctx).await;
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].code, "BUILD_PHILOSOPHY_RED_QA_MISSING");

        let (_tmp, ctx) = context_with(&[("architecture.md", "# design"), ("red-qa.log", "0/12")]).await;
        let result = BuildPhilosophyCompliance.validate(&ctx).await;
        assert!(result.passed());
        assert_eq!(result.evidence.len(), 2);
    }

    #[tokio::test]
    async fn dry_run_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let snapshot = foreman_evidence::SnapshotBuilder::new()
            .build(1, "abc", &tmp.path().join("absent"))
            .await
            .unwrap();
        let ctx = crate::context::GateContext::new(snapshot);
        let result = BuildPhilosophyCompliance.validate(&ctx).await;
        assert_eq!(result.violations.len(), 2);
    }
}
