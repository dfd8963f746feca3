//! Markdown rendering of a gate run

use crate::result::{ControlStatus, GateResult};
use foreman_evidence::ControlName;
use std::fmt::Write;

fn badge(status: ControlStatus) -> &'static str {
    match status {
        ControlStatus::Pass => "✅ PASS",
        ControlStatus::Fail => "❌ FAIL",
    }
}

/// Render `result` as a markdown report
///
/// Controls that never ran are listed as skipped so a reader sees where the
/// run stopped.
#[must_use]
pub fn render_markdown(result: &GateResult) -> String {
    let mut out = String::new();
    let overall = if result.passed { ControlStatus::Pass } else { ControlStatus::Fail };

    // writing into a String cannot fail
    let _ = writeln!(out, "# Governance Gate Report\n");
    let _ = writeln!(out, "- **PR:** #{}", result.pr_number);
    let _ = writeln!(out, "- **Commit:** `{}`", result.commit_sha);
    let _ = writeln!(out, "- **Snapshot:** `{}`", result.snapshot_id);
    let _ = writeln!(out, "- **Result:** {}", badge(overall));
    let _ = writeln!(
        out,
        "- **Merge allowed:** {}",
        if result.merge_allowed { "yes" } else { "no" }
    );
    let _ = writeln!(out, "- **Duration:** {} ms\n", result.duration_ms);

    let _ = writeln!(out, "## Controls\n");
    let _ = writeln!(out, "| # | Control | Status | Message |");
    let _ = writeln!(out, "|---|---------|--------|---------|");
    for (i, name) in ControlName::ALL.into_iter().enumerate() {
        let row = result.controls.iter().find(|c| c.control_name == name);
        let (status, message) = match row {
            Some(c) => (badge(c.status), c.message.as_str()),
            None => ("⏭ SKIPPED", "not run"),
        };
        let _ = writeln!(out, "| {} | {name} ({}) | {status} | {message} |", i + 1, name.title());
    }

    if !result.violations.is_empty() {
        let _ = writeln!(out, "\n## Violations\n");
        for v in &result.violations {
            let _ = writeln!(out, "- **{}** ({}): {}", v.code, v.severity, v.message);
            for e in &v.evidence {
                let _ = writeln!(out, "  - `{}`", e.path);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ControlResult, Violation};
    use chrono::Utc;
    use foreman_constitutional::Severity;

    #[test]
    fn lists_skipped_controls_and_violations() {
        let fail = ControlResult::from_violations(
            ControlName::Qiel,
            Severity::Critical,
            vec![],
            vec![Violation::new("QIEL_NO_QA_RUN", "No QA results recorded for this PR", Severity::Critical)],
            "",
        );
        let result = GateResult {
            pr_number: 9,
            commit_sha: "abc".into(),
            snapshot_id: "snap".into(),
            passed: false,
            violations: fail.violations.clone(),
            controls: vec![fail],
            merge_allowed: false,
            duration_ms: 3,
            timestamp: Utc::now(),
        };
        let report = result.report_markdown();
        assert!(report.contains("- **Merge allowed:** no"));
        assert!(report.contains("| 1 | QIEL (QA Integrity Enforcement) | ❌ FAIL |"));
        assert!(report.contains("| 9 | BuildPhilosophy (Build Philosophy) | ⏭ SKIPPED | not run |"));
        assert!(report.contains("**QIEL_NO_QA_RUN** (critical)"));
    }
}
