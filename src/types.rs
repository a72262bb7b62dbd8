//! Core data model shared by every detection layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Severity of a single finding.
///
/// Ordered so that `Low < Medium < High`; the verdict treats anything at
/// `Medium` or above as insecure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parse an uppercased severity label, as emitted by external tools.
    ///
    /// Unknown labels map to `Low` so a collaborator's new severity tier can
    /// never silently flip a verdict.
    pub fn from_label(label: &str) -> Self {
        match label.to_uppercase().as_str() {
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            _ => Self::Low,
        }
    }

    /// True when an issue of this severity makes the scanned file insecure.
    pub fn is_blocking(&self) -> bool {
        *self >= Self::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete finding produced by any detection layer.
///
/// Issues are value objects: two issues with identical severity and detail
/// are duplicates within a single engine's run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub detail: String,
}

impl Issue {
    pub fn new(severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            severity,
            detail: detail.into(),
        }
    }

    /// Build an issue with the fixed `(line N)` suffix used whenever a
    /// source line is known.
    pub fn at_line(severity: Severity, detail: impl fmt::Display, line: usize) -> Self {
        Self {
            severity,
            detail: format!("{detail} (line {line})"),
        }
    }
}

/// Outcome of scanning one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Resolved absolute path of the scanned file, even when the input was
    /// relative or missing.
    pub file: PathBuf,
    /// All findings, in emission order: static engine, linter, sandbox.
    pub issues: Vec<Issue>,
    /// Derived verdict: true iff no issue is `Medium` or `High`.
    pub secure: bool,
}

impl ScanResult {
    /// Assemble a result, deriving the verdict from the issue list.
    pub fn from_issues(file: PathBuf, issues: Vec<Issue>) -> Self {
        let secure = !issues.iter().any(|issue| issue.severity.is_blocking());
        Self {
            file,
            issues,
            secure,
        }
    }

    /// Highest severity present, if any issue was found.
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|issue| issue.severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(!Severity::Low.is_blocking());
        assert!(Severity::Medium.is_blocking());
        assert!(Severity::High.is_blocking());
    }

    #[test]
    fn severity_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Medium).unwrap(),
            "\"MEDIUM\""
        );
        assert_eq!(
            serde_json::from_str::<Severity>("\"HIGH\"").unwrap(),
            Severity::High
        );
    }

    #[test]
    fn unknown_labels_degrade_to_low() {
        assert_eq!(Severity::from_label("UNDEFINED"), Severity::Low);
        assert_eq!(Severity::from_label("high"), Severity::High);
    }

    #[test]
    fn verdict_derivation() {
        let clean = ScanResult::from_issues("/tmp/a.py".into(), vec![]);
        assert!(clean.secure);

        let low_only = ScanResult::from_issues(
            "/tmp/a.py".into(),
            vec![Issue::new(Severity::Low, "Imports risky module 'os'.")],
        );
        assert!(low_only.secure);

        let medium = ScanResult::from_issues(
            "/tmp/a.py".into(),
            vec![Issue::new(Severity::Medium, "Imports risky module 'socket'.")],
        );
        assert!(!medium.secure);
        assert_eq!(medium.max_severity(), Some(Severity::Medium));
    }

    #[test]
    fn line_suffix_format() {
        let issue = Issue::at_line(Severity::High, "Uses eval() for dynamic code execution.", 7);
        assert_eq!(
            issue.detail,
            "Uses eval() for dynamic code execution. (line 7)"
        );
    }
}
