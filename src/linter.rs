//! Adapter around the Bandit security linter.
//!
//! Bandit is an optional collaborator: when it is installed its findings are
//! normalized into the unified issue shape, and when it is absent or fails
//! the scan degrades to a single LOW notice. This adapter must never abort
//! or block the overall scan.

use crate::types::{Issue, Severity};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditResult>,
}

#[derive(Debug, Deserialize)]
struct BanditResult {
    test_id: String,
    issue_text: String,
    issue_severity: String,
    line_number: Option<u64>,
}

/// Run Bandit against a single file, non-recursive.
pub async fn run(path: &Path) -> Vec<Issue> {
    let bandit = match which::which("bandit") {
        Ok(binary) => binary,
        Err(_) => {
            tracing::debug!("bandit not on PATH, skipping linter pass");
            return vec![Issue::new(
                Severity::Low,
                "Bandit scan skipped: bandit executable not found.",
            )];
        }
    };

    match invoke(&bandit, path).await {
        Ok(issues) => issues,
        Err(error) => {
            tracing::warn!("bandit run failed for {}: {error}", path.display());
            vec![Issue::new(
                Severity::Low,
                format!("Bandit scan failed: {error}"),
            )]
        }
    }
}

async fn invoke(bandit: &Path, path: &Path) -> Result<Vec<Issue>> {
    let output = Command::new(bandit)
        .args(["-f", "json", "-q"])
        .arg(path)
        .output()
        .await
        .context("failed to spawn bandit")?;

    // Bandit exits 1 when it finds issues; anything else is a real failure.
    match output.status.code() {
        Some(0) | Some(1) => {}
        code => bail!("bandit exited with status {code:?}"),
    }

    let report: BanditReport =
        serde_json::from_slice(&output.stdout).context("bandit produced unparseable output")?;

    Ok(report
        .results
        .into_iter()
        .map(|result| {
            let detail = match result.line_number {
                Some(line) => format!(
                    "Bandit {}: {} (line {line})",
                    result.test_id, result.issue_text
                ),
                None => format!("Bandit {}: {}", result.test_id, result.issue_text),
            };
            Issue::new(Severity::from_label(&result.issue_severity), detail)
        })
        .collect())
}
