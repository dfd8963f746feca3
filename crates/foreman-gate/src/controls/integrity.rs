//! CS1: constitutional files stay untouched
//!
//! Three checks over the PR's changed files:
//! - no protected path is modified
//! - no source file carries a lint or type-check suppression directive
//! - files with a recorded baseline hash still match it

use crate::context::GateContext;
use crate::control::GovernanceControl;
use crate::result::{ControlResult, EvidenceRef, Violation};
use async_trait::async_trait;
use foreman_constitutional::{ProtectedPaths, Severity};
use foreman_evidence::{ContentHash, ControlName};

/// Directives that silence checks instead of fixing code
pub const SUPPRESSION_DIRECTIVES: &[&str] = &[
    "eslint-disable",
    "@ts-ignore",
    "@ts-expect-error",
    "@ts-nocheck",
    "prettier-ignore",
    "#[allow(",
    "#![allow(",
];

const SOURCE_EXTENSIONS: &[&str] = &["rs", "ts", "tsx", "js", "jsx"];

/// CS1 control
#[derive(Debug, Clone, Default)]
pub struct ConstitutionalIntegrity {
    protected: ProtectedPaths,
}

impl ConstitutionalIntegrity {
    /// Control over a custom protected-path table
    #[must_use]
    pub fn new(protected: ProtectedPaths) -> Self {
        Self { protected }
    }
}

fn is_source(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

#[async_trait]
impl GovernanceControl for ConstitutionalIntegrity {
    fn name(&self) -> ControlName {
        ControlName::Cs1
    }

    async fn validate(&self, context: &GateContext) -> ControlResult {
        let mut violations = Vec::new();
        let mut evidence = Vec::new();

        for file in context.changed_files() {
            if self.protected.is_protected(&file.path) {
                violations.push(
                    Violation::new(
                        "CS1_PROTECTED_FILE_MODIFIED",
                        format!("Protected file modified: {}", file.path),
                        Severity::Critical,
                    )
                    .with_evidence(EvidenceRef::path(&file.path)),
                );
            }

            if is_source(&file.path) {
                for directive in SUPPRESSION_DIRECTIVES {
                    if file.content.contains(directive) {
                        violations.push(
                            Violation::new(
                                "CS1_SUPPRESSION_DETECTED",
                                format!("Suppression comment detected in {}: {directive}", file.path),
                                Severity::High,
                            )
                            .with_evidence(EvidenceRef::path(&file.path)),
                        );
                    }
                }
            }

            if let Some(expected) = context.baseline_hashes().get(&file.path) {
                let actual = ContentHash::compute(file.content.as_bytes());
                evidence.push(EvidenceRef::path(&file.path).with_hash(*expected));
                if actual != *expected {
                    violations.push(
                        Violation::new(
                            "CS1_HASH_MISMATCH",
                            format!("Protected file hash mismatch: {}", file.path),
                            Severity::Critical,
                        )
                        .with_evidence(EvidenceRef::path(&file.path).with_hash(actual)),
                    );
                }
            }
        }

        ControlResult::from_violations(
            ControlName::Cs1,
            Severity::Critical,
            evidence,
            violations,
            "Constitutional integrity maintained",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::context_with;

    #[tokio::test]
    async fn protected_workflow_edit_fails() {
        let (_tmp, ctx) = context_with(&[]).await;
        let ctx = ctx.with_changed_file(".github/workflows/ci.yml", "on: push");
        let result = ConstitutionalIntegrity::default().validate(&ctx).await;
        assert!(!result.passed());
        assert_eq!(result.violations[0].code, "CS1_PROTECTED_FILE_MODIFIED");
        assert_eq!(result.violations[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn suppressions_only_checked_in_source() {
        let (_tmp, ctx) = context_with(&[]).await;
        let ctx = ctx
            .with_changed_file("src/app.ts", "// @ts-ignore\nconst x: number = 'a';")
            .with_changed_file("docs/lint.md", "Never use eslint-disable.");
        let result = ConstitutionalIntegrity::default().validate(&ctx).await;
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].code, "CS1_SUPPRESSION_DETECTED");
        assert!(result.violations[0].message.contains("src/app.ts: @ts-ignore"));
    }

    #[tokio::test]
    async fn baseline_drift_detected() {
        let (_tmp, ctx) = context_with(&[]).await;
        let ctx = ctx
            .with_baseline_hash("src/policy.rs", ContentHash::compute(b"fn policy() {}"))
            .with_changed_file("src/policy.rs", "fn policy() { todo() }");
        let result = ConstitutionalIntegrity::default().validate(&ctx).await;
        assert_eq!(result.violations[0].code, "CS1_HASH_MISMATCH");
        assert_eq!(result.evidence.len(), 1);
    }

    #[tokio::test]
    async fn clean_change_passes() {
        let (_tmp, ctx) = context_with(&[]).await;
        let ctx = ctx
            .with_baseline_hash("src/policy.rs", ContentHash::compute(b"fn policy() {}"))
            .with_changed_file("src/policy.rs", "fn policy() {}");
        assert!(ConstitutionalIntegrity::default().validate(&ctx).await.passed());
    }
}
