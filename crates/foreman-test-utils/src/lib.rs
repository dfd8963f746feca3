//! Testing utilities for the Foreman workspace
//!
//! Shared fixtures: valid build requests, scripted builders and evidence trees.

#![allow(missing_docs)]

use async_trait::async_trait;
use foreman_constitutional::{
    BuildRequest, ProtocolValidator, QaResult, QaSuiteStatus, RawArchitecture, RawBuildRequest, RawMetadata,
    RawQaSuite, BUILD_INSTRUCTION, PROTOCOL_VERSION,
};
use foreman_core::{Builder, BuilderFailure, BuilderOutput, ChangedFile, FallbackContext};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SAMPLE_TASK_ID: &str = "task-001";
pub const SAMPLE_FAILING: u64 = 10;

/// Route tracing to the test writer; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,foreman_core=debug,foreman_gate=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Request that passes all eight protocol gates: RED, 10 of 10 failing
pub fn sample_raw_request() -> RawBuildRequest {
    RawBuildRequest {
        protocol_version: Some(PROTOCOL_VERSION.to_string()),
        instruction: Some(BUILD_INSTRUCTION.to_string()),
        architecture: Some(RawArchitecture {
            reference: Some("docs/architecture/login.md".into()),
            summary: Some("Login form with email and password".into()),
        }),
        qa_suite: Some(RawQaSuite {
            name: Some("login".into()),
            location: Some("tests/login".into()),
            current_status: Some(QaSuiteStatus::Red),
            total_tests: Some(SAMPLE_FAILING),
            passing_tests: Some(0),
            failing_tests: Some(SAMPLE_FAILING),
        }),
        acceptance_criteria: Some("100% QA passing".into()),
        organisation_id: Some("org-1".into()),
        metadata: Some(RawMetadata {
            task_id: Some(SAMPLE_TASK_ID.into()),
            priority: None,
            timeout_seconds: Some(600),
        }),
        files: vec!["src/login.rs".into()],
    }
}

pub fn validated_request() -> BuildRequest {
    ProtocolValidator::new().validate(&sample_raw_request()).unwrap()
}

/// Output with `passing` of `total` tests green
pub fn qa_output(total: u64, passing: u64) -> BuilderOutput {
    BuilderOutput {
        qa: QaResult::new(total, passing, total - passing),
        changed_files: vec![ChangedFile {
            path: "src/login.rs".into(),
            content: format!("// {passing}/{total}\npub fn login() {{}}\n"),
        }],
        ..BuilderOutput::default()
    }
}

/// Builder replaying a fixed script; repeats the last step when exhausted
#[derive(Debug)]
pub struct ScriptedBuilder {
    name: String,
    script: Mutex<VecDeque<Result<BuilderOutput, BuilderFailure>>>,
    calls: AtomicUsize,
    checkpoints_seen: Mutex<Vec<usize>>,
}

impl ScriptedBuilder {
    pub fn new(name: &str, script: impl IntoIterator<Item = Result<BuilderOutput, BuilderFailure>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            checkpoints_seen: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds with a steadily greener QA run, reaching green on `steps`
    pub fn converging(name: &str, total: u64, steps: u64) -> Self {
        Self::new(name, (1..=steps).map(|i| Ok(qa_output(total, total * i / steps))))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Checkpoints carried in the context on each call
    pub fn checkpoints_seen(&self) -> Vec<usize> {
        self.checkpoints_seen.lock().clone()
    }
}

#[async_trait]
impl Builder for ScriptedBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &FallbackContext) -> Result<BuilderOutput, BuilderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoints_seen.lock().push(context.checkpoints.len());
        let mut script = self.script.lock();
        if script.len() > 1 {
            return script.pop_front().unwrap();
        }
        script
            .front()
            .cloned()
            .unwrap_or_else(|| Err(BuilderFailure::Application("script empty".into())))
    }
}

/// Builder that always fails the same way
#[derive(Debug)]
pub struct FailingBuilder {
    name: String,
    failure: BuilderFailure,
    calls: AtomicUsize,
}

impl FailingBuilder {
    pub fn new(name: &str, failure: BuilderFailure) -> Self {
        Self {
            name: name.to_string(),
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Builder for FailingBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _context: &FallbackContext) -> Result<BuilderOutput, BuilderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}

/// Evidence a compliant build leaves behind
pub const EVIDENCE_FILES: &[(&str, &str)] = &[
    ("architecture.md", "# Login architecture\n"),
    ("red-qa.log", "0/10 passing\n"),
    ("qa-results.json", "{\"total\":10,\"passing\":10}\n"),
    ("cs1-constitutional.log", "no protected files touched\n"),
    ("build-philosophy.md", "architecture -> red qa -> green\n"),
];

/// Write [`EVIDENCE_FILES`] into `dir`, creating it
pub async fn write_evidence_tree(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    for (name, body) in EVIDENCE_FILES {
        tokio::fs::write(dir.join(name), body).await?;
    }
    Ok(())
}

/// Sealed snapshot over a freshly written evidence tree under `root`
pub async fn sample_snapshot(root: &Path, pr_number: u64) -> anyhow::Result<foreman_evidence::EvidenceSnapshot> {
    let dir = root.join("evidence");
    write_evidence_tree(&dir).await?;
    Ok(foreman_evidence::SnapshotBuilder::new()
        .build(pr_number, "abc123def456", &dir)
        .await?)
}
