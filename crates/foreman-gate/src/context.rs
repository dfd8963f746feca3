//! Everything a gate run validates
//!
//! The sealed [`EvidenceSnapshot`] plus live repository state: the latest
//! QA summary, the files the PR changes, baseline hashes of protected files,
//! architecture changes and open incidents.

use foreman_constitutional::QaResult;
use foreman_core::ChangedFile;
use foreman_evidence::{ContentHash, EvidenceSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A change to the architecture made by the PR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureChange {
    /// What changed
    pub description: String,
    /// Approver, once approved
    #[serde(default)]
    pub approved_by: Option<String>,
}

impl ArchitectureChange {
    /// Unapproved change
    #[must_use]
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            approved_by: None,
        }
    }

    /// Approved change
    #[must_use]
    pub fn approved(description: impl Into<String>, approver: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            approved_by: Some(approver.into()),
        }
    }
}

/// A recorded incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Incident id
    pub id: String,
    /// PR the incident is filed against
    pub pr_number: u64,
    /// Summary
    pub summary: String,
    /// Closed incidents no longer block
    #[serde(default)]
    pub resolved: bool,
}

/// Input to one gate run
#[derive(Debug, Clone)]
pub struct GateContext {
    snapshot: EvidenceSnapshot,
    qa: QaResult,
    changed_files: Vec<ChangedFile>,
    baseline_hashes: BTreeMap<String, ContentHash>,
    architecture_changes: Vec<ArchitectureChange>,
    incidents: Vec<Incident>,
}

impl GateContext {
    /// Context bound to `snapshot`, with no QA run recorded
    #[must_use]
    pub fn new(snapshot: EvidenceSnapshot) -> Self {
        Self {
            snapshot,
            qa: QaResult::default(),
            changed_files: Vec::new(),
            baseline_hashes: BTreeMap::new(),
            architecture_changes: Vec::new(),
            incidents: Vec::new(),
        }
    }

    /// With the latest QA summary
    #[must_use]
    pub fn with_qa(mut self, qa: QaResult) -> Self {
        self.qa = qa;
        self
    }

    /// With files changed by the PR
    #[must_use]
    pub fn with_changed_files(mut self, files: impl IntoIterator<Item = ChangedFile>) -> Self {
        self.changed_files.extend(files);
        self
    }

    /// With one changed file
    #[must_use]
    pub fn with_changed_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.changed_files.push(ChangedFile {
            path: path.into(),
            content: content.into(),
        });
        self
    }

    /// With the recorded hash of a protected file
    #[must_use]
    pub fn with_baseline_hash(mut self, path: impl Into<String>, hash: ContentHash) -> Self {
        self.baseline_hashes.insert(path.into(), hash);
        self
    }

    /// With an architecture change
    #[must_use]
    pub fn with_architecture_change(mut self, change: ArchitectureChange) -> Self {
        self.architecture_changes.push(change);
        self
    }

    /// With an incident
    #[must_use]
    pub fn with_incident(mut self, incident: Incident) -> Self {
        self.incidents.push(incident);
        self
    }

    /// Sealed evidence
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &EvidenceSnapshot {
        &self.snapshot
    }

    /// Latest QA summary
    #[inline]
    #[must_use]
    pub fn qa(&self) -> &QaResult {
        &self.qa
    }

    /// Files changed by the PR
    #[inline]
    #[must_use]
    pub fn changed_files(&self) -> &[ChangedFile] {
        &self.changed_files
    }

    /// Baseline hashes of protected files
    #[inline]
    #[must_use]
    pub fn baseline_hashes(&self) -> &BTreeMap<String, ContentHash> {
        &self.baseline_hashes
    }

    /// Architecture changes
    #[inline]
    #[must_use]
    pub fn architecture_changes(&self) -> &[ArchitectureChange] {
        &self.architecture_changes
    }

    /// Unresolved incidents filed against this snapshot's PR
    pub fn open_incidents(&self) -> impl Iterator<Item = &Incident> {
        let pr = self.snapshot.pr_number();
        self.incidents.iter().filter(move |i| !i.resolved && i.pr_number == pr)
    }
}
