//! Protected constitutional paths
//!
//! Builders may never touch these. A single match anywhere in a request's
//! file list rejects the whole request.

use crate::error::ConstitutionalError;
use crate::violation::BuildPhilosophyViolation;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static DEFAULT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let mut patterns: Vec<Regex> = [
        r"^\.github/workflows/",
        r"^\.github/foreman/agent-contract\.md$",
        r"^BUILD_PHILOSOPHY\.md$",
        r"^foreman/constitution/",
        r"^foreman/architecture-design-checklist\.md$",
        r"^maturion-philosophy-tree\.md$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();
    if let Ok(tree) = RegexBuilder::new("philosophy-tree").case_insensitive(true).build() {
        patterns.push(tree);
    }
    patterns
});

/// Outcome of checking a file list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPathCheck {
    /// True when no path is protected
    pub allowed: bool,
    /// Every protected path found, in input order
    pub violations: Vec<String>,
}

/// Ordered table of protected path patterns
#[derive(Debug, Clone)]
pub struct ProtectedPaths {
    patterns: Vec<Regex>,
}

impl Default for ProtectedPaths {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }
}

impl ProtectedPaths {
    /// Table from explicit patterns
    ///
    /// # Errors
    /// Returns the regex error for the first invalid pattern
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Add one pattern to the table
    ///
    /// # Errors
    /// Returns the regex error if `pattern` is invalid
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Whether a single path is protected
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        let normalized = normalize(path);
        self.patterns.iter().any(|p| p.is_match(&normalized))
    }

    /// Check every path
    #[must_use]
    pub fn check<S: AsRef<str>>(&self, paths: &[S]) -> ProtectedPathCheck {
        let violations: Vec<String> = paths
            .iter()
            .map(|p| -> &str { p.as_ref() })
            .filter(|p| self.is_protected(p))
            .map(str::to_string)
            .collect();
        ProtectedPathCheck {
            allowed: violations.is_empty(),
            violations,
        }
    }

    /// Reject if any path is protected
    ///
    /// # Errors
    /// [`ConstitutionalError::ProtectedPath`] listing every offending path
    pub fn validate<S: AsRef<str>>(&self, paths: &[S]) -> Result<(), ConstitutionalError> {
        let check = self.check(paths);
        if check.allowed {
            return Ok(());
        }
        tracing::warn!(paths = ?check.violations, "protected path modification requested");
        let violation = BuildPhilosophyViolation::new(
            "REJECTED: Protected path modification",
            format!("Cannot modify protected path: {}", check.violations.join(", ")),
            "Constitutional files are immutable",
            "Remove protected path from build scope",
        )
        .constitutional();
        Err(ConstitutionalError::ProtectedPath {
            paths: check.violations,
            violation: Box::new(violation),
        })
    }
}

/// Repository-relative form of `path`
///
/// Leading and repeated separators are dropped, `.` segments vanish and
/// `..` pops its parent. A `..` above the root is discarded.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let table = ProtectedPaths::default();
        for path in [
            ".github/workflows/ci.yml",
            ".github/foreman/agent-contract.md",
            "BUILD_PHILOSOPHY.md",
            "foreman/constitution/rules.md",
            "foreman/architecture-design-checklist.md",
            "maturion-philosophy-tree.md",
            "docs/Philosophy-Tree/notes.md",
            "./BUILD_PHILOSOPHY.md",
        ] {
            assert!(table.is_protected(path), "{path} should be protected");
        }
        for path in ["src/main.rs", "docs/BUILD_PHILOSOPHY.md", ".github/dependabot.yml"] {
            assert!(!table.is_protected(path), "{path} should not be protected");
        }
    }

    #[test]
    fn disguised_paths_are_still_protected() {
        let table = ProtectedPaths::default();
        for path in [
            "/BUILD_PHILOSOPHY.md",
            ".//.github/workflows/ci.yml",
            "src/../.github/workflows/x.yml",
            "foreman//constitution/./rules.md",
            "../BUILD_PHILOSOPHY.md",
        ] {
            assert!(table.is_protected(path), "{path} should be protected");
        }
        assert!(table.validate(&["src/../.github/workflows/x.yml"]).is_err());
        assert!(!table.is_protected(".github/workflows/../dependabot.yml"));
    }

    #[test]
    fn normalize_resolves_segments() {
        assert_eq!(normalize("/a//b/./c"), "a/b/c");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("./"), "");
    }

    #[test]
    fn check_collects_all_violations() {
        let table = ProtectedPaths::default();
        let check = table.check(&["src/a.rs", "BUILD_PHILOSOPHY.md", "foreman/constitution/x"]);
        assert!(!check.allowed);
        assert_eq!(check.violations, vec!["BUILD_PHILOSOPHY.md", "foreman/constitution/x"]);
    }

    #[test]
    fn custom_pattern() {
        let table = ProtectedPaths::from_patterns([r"^secrets/"]).unwrap();
        assert!(table.is_protected("secrets/key.pem"));
        assert!(!table.is_protected("BUILD_PHILOSOPHY.md"));
        assert!(ProtectedPaths::from_patterns(["("]).is_err());
    }

    #[test]
    fn empty_list_allowed() {
        let empty: [&str; 0] = [];
        assert!(ProtectedPaths::default().validate(&empty).is_ok());
    }
}
