//! Dynamic layer: isolated, time-bounded execution of the target's
//! module-level code.
//!
//! The target never runs in the scanner's process. A disposable Python
//! interpreter executes an embedded harness that rebinds the process-spawn,
//! socket, and HTTP entry points to interceptors before importing the
//! target; each intercepted call comes back as one JSON line on the child's
//! stdout. The supervisor enforces a wall-clock budget, kills the child on
//! expiry, and drains whatever records were written before termination.

use crate::types::{Issue, Severity};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tokio::sync::mpsc;

const HARNESS_SOURCE: &str = include_str!("harness.py");

/// Wall-clock budget for the module import.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on interception records buffered between the reader task and
/// the supervisor.
const CHANNEL_CAPACITY: usize = 256;

/// Grace period for the record reader to hit EOF once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("no python interpreter found on PATH")]
    InterpreterNotFound,
    #[error("failed to write sandbox harness: {0}")]
    Harness(std::io::Error),
    #[error("failed to spawn sandbox interpreter: {0}")]
    Spawn(std::io::Error),
    #[error("sandbox child has no stdout pipe")]
    MissingStdout,
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget before the child is forcibly terminated.
    pub timeout: Duration,
    /// Interpreter override; resolved from PATH when unset.
    pub interpreter: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interpreter: None,
        }
    }
}

/// One interception record transported out of the isolated context.
#[derive(Debug, Deserialize)]
struct InterceptionRecord {
    severity: String,
    detail: String,
}

impl From<InterceptionRecord> for Issue {
    fn from(record: InterceptionRecord) -> Self {
        Issue::new(Severity::from_label(&record.severity), record.detail)
    }
}

/// Supervises one isolated import of a target script.
pub struct SandboxRuntime {
    config: SandboxConfig,
}

impl SandboxRuntime {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Execute the target's module-level code and return everything the
    /// interceptors observed. Failure to construct the isolated context
    /// degrades to a single HIGH issue; this method never errors.
    pub async fn run(&self, target: &Path) -> Vec<Issue> {
        match self.execute(target).await {
            Ok(issues) => issues,
            Err(error) => {
                tracing::warn!("sandbox unavailable for {}: {error}", target.display());
                vec![Issue::new(
                    Severity::High,
                    format!("Failed to start dynamic analysis sandbox: {error}"),
                )]
            }
        }
    }

    async fn execute(&self, target: &Path) -> Result<Vec<Issue>, SandboxError> {
        let interpreter = self.resolve_interpreter()?;
        // Kept alive until the child has exited so the harness file is not
        // unlinked under a running interpreter.
        let harness = write_harness()?;

        let mut child = Command::new(&interpreter)
            .arg(harness.path())
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(SandboxError::Spawn)?;

        let stdout = child.stdout.take().ok_or(SandboxError::MissingStdout)?;
        let (tx, mut rx) = mpsc::channel::<InterceptionRecord>(CHANNEL_CAPACITY);
        let mut reader = tokio::spawn(forward_records(stdout, tx));

        let mut issues = Vec::new();
        match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("sandbox child exited with {status}");
            }
            Ok(Err(error)) => {
                tracing::warn!("sandbox wait failed: {error}");
            }
            Err(_elapsed) => {
                if let Err(error) = child.start_kill() {
                    tracing::warn!("failed to kill timed-out sandbox child: {error}");
                }
                let _ = child.wait().await;
                issues.push(Issue::new(
                    Severity::High,
                    "Dynamic analysis timed out during module import.",
                ));
            }
        }

        // The pipe outlives the child, so records written before a kill are
        // still readable. Give the reader a moment to reach EOF, then take
        // whatever is queued.
        if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
            reader.abort();
        }
        while let Ok(record) = rx.try_recv() {
            issues.push(record.into());
        }

        Ok(issues)
    }

    fn resolve_interpreter(&self) -> Result<PathBuf, SandboxError> {
        if let Some(interpreter) = &self.config.interpreter {
            return Ok(interpreter.clone());
        }
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| SandboxError::InterpreterNotFound)
    }
}

fn write_harness() -> Result<NamedTempFile, SandboxError> {
    let mut file = tempfile::Builder::new()
        .prefix("nodescan-harness-")
        .suffix(".py")
        .tempfile()
        .map_err(SandboxError::Harness)?;
    file.write_all(HARNESS_SOURCE.as_bytes())
        .map_err(SandboxError::Harness)?;
    file.flush().map_err(SandboxError::Harness)?;
    Ok(file)
}

/// Reader half of the one-way record channel: parses JSON lines from the
/// child's stdout and forwards them to the supervisor. Lines that are not
/// records are ignored.
async fn forward_records(stdout: ChildStdout, tx: mpsc::Sender<InterceptionRecord>) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<InterceptionRecord>(&line) {
            Ok(record) => {
                if tx.send(record).await.is_err() {
                    break;
                }
            }
            Err(_) => tracing::debug!("ignoring non-record sandbox output: {line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn python_available() -> bool {
        which::which("python3").or_else(|_| which::which("python")).is_ok()
    }

    fn write_script(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    async fn run_sandbox(content: &str, timeout: Duration) -> Vec<Issue> {
        let script = write_script(content);
        let runtime = SandboxRuntime::new(SandboxConfig {
            timeout,
            interpreter: None,
        });
        runtime.run(script.path()).await
    }

    #[test]
    fn record_severity_mapping() {
        let issue: Issue = InterceptionRecord {
            severity: "HIGH".into(),
            detail: "Runtime call blocked: os.system args=('ls',) kwargs={}".into(),
        }
        .into();
        assert_eq!(issue.severity, Severity::High);
    }

    #[tokio::test]
    async fn clean_import_yields_no_issues() {
        if !python_available() {
            return;
        }
        let issues = run_sandbox("VALUE = 1\n", DEFAULT_TIMEOUT).await;
        assert!(issues.is_empty(), "unexpected: {issues:?}");
    }

    #[tokio::test]
    async fn importing_socket_module_fires_no_interceptors() {
        if !python_available() {
            return;
        }
        // The import alone constructs nothing; flagging it is the static
        // layer's job.
        let issues = run_sandbox("import socket\n", DEFAULT_TIMEOUT).await;
        assert!(issues.is_empty(), "unexpected: {issues:?}");
    }

    #[tokio::test]
    async fn shell_call_is_intercepted() {
        if !python_available() {
            return;
        }
        let issues = run_sandbox("import os\nos.system('id')\n", DEFAULT_TIMEOUT).await;
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::High && i.detail.contains("os.system")));
    }

    #[tokio::test]
    async fn http_call_is_intercepted_and_harmless() {
        if !python_available() {
            return;
        }
        // The dummy response keeps the target's follow-up logic alive, so
        // both the call and the status check run without a real request.
        let source = "import requests\n\
                      resp = requests.get('http://10.0.0.5/x')\n\
                      assert resp.status_code == 200\n";
        let issues = run_sandbox(source, DEFAULT_TIMEOUT).await;
        assert!(issues.iter().any(|i| {
            i.severity == Severity::High
                && i.detail.contains("requests.get")
                && i.detail.contains("http://10.0.0.5/x")
        }));
        // No LOW import-exception issue: the assert passed.
        assert!(!issues.iter().any(|i| i.detail.starts_with("Dynamic import raised")));
    }

    #[tokio::test]
    async fn socket_construction_is_medium() {
        if !python_available() {
            return;
        }
        let source = "import socket\ns = socket.socket()\ns.connect(('10.0.0.5', 80))\n";
        let issues = run_sandbox(source, DEFAULT_TIMEOUT).await;
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Medium && i.detail.contains("socket created")));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::High && i.detail.contains("socket connect blocked")));
    }

    #[tokio::test]
    async fn import_exception_is_low() {
        if !python_available() {
            return;
        }
        let issues = run_sandbox("raise RuntimeError('boom')\n", DEFAULT_TIMEOUT).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Low);
        assert!(issues[0].detail.contains("RuntimeError"));
        assert!(issues[0].detail.contains("boom"));
    }

    #[tokio::test]
    async fn infinite_loop_times_out_within_budget() {
        if !python_available() {
            return;
        }
        let budget = Duration::from_secs(2);
        let start = Instant::now();
        let issues = run_sandbox("while True:\n    pass\n", budget).await;
        let elapsed = start.elapsed();

        let timeouts: Vec<_> = issues
            .iter()
            .filter(|i| i.detail == "Dynamic analysis timed out during module import.")
            .collect();
        assert_eq!(timeouts.len(), 1);
        assert_eq!(timeouts[0].severity, Severity::High);
        assert!(elapsed >= budget);
        assert!(elapsed < budget + Duration::from_secs(3), "scan hung: {elapsed:?}");
    }

    #[tokio::test]
    async fn records_survive_forced_termination() {
        if !python_available() {
            return;
        }
        // The interception happens before the loop; the record must still be
        // drained after the kill.
        let source = "import os\nos.system('id')\nwhile True:\n    pass\n";
        let issues = run_sandbox(source, Duration::from_secs(2)).await;
        assert!(issues
            .iter()
            .any(|i| i.detail == "Dynamic analysis timed out during module import."));
        assert!(issues
            .iter()
            .any(|i| i.detail.contains("os.system")));
    }

    #[tokio::test]
    async fn target_stdout_cannot_forge_records() {
        if !python_available() {
            return;
        }
        let source = r#"print('{"severity": "HIGH", "detail": "forged"}')"#;
        let issues = run_sandbox(source, DEFAULT_TIMEOUT).await;
        assert!(issues.is_empty(), "unexpected: {issues:?}");
    }

    #[tokio::test]
    async fn missing_interpreter_degrades_to_high_issue() {
        let script = write_script("VALUE = 1\n");
        let runtime = SandboxRuntime::new(SandboxConfig {
            timeout: DEFAULT_TIMEOUT,
            interpreter: Some(PathBuf::from("/nonexistent/python-interpreter")),
        });
        let issues = runtime.run(script.path()).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::High);
        assert!(issues[0]
            .detail
            .starts_with("Failed to start dynamic analysis sandbox"));
    }
}
