//! Scan orchestration: runs the static engine, the linter adapter, and the
//! sandbox runtime over one file and reduces their findings to a verdict.

use crate::analyzers::StaticAnalyzer;
use crate::linter;
use crate::sandbox::{SandboxConfig, SandboxRuntime, DEFAULT_TIMEOUT};
use crate::signatures::SignatureCatalog;
use crate::types::{Issue, ScanResult, Severity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("invalid built-in signature: {0}")]
    Signature(#[from] regex::Error),
}

/// Per-scanner configuration. Engines can be disabled individually so a
/// caller can scope a scan to the layers it needs.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Wall-clock budget for the dynamic layer.
    pub sandbox_timeout: Duration,
    /// Interpreter override for the dynamic layer; resolved from PATH when
    /// unset.
    pub python_interpreter: Option<PathBuf>,
    /// Run the Bandit linter pass.
    pub run_linter: bool,
    /// Run the dynamic sandbox pass.
    pub run_sandbox: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sandbox_timeout: DEFAULT_TIMEOUT,
            python_interpreter: None,
            run_linter: true,
            run_sandbox: true,
        }
    }
}

/// Scans one untrusted node script at a time. The compiled signature
/// catalog is immutable and shared by every scan this scanner performs.
pub struct Scanner {
    catalog: Arc<SignatureCatalog>,
    config: ScanConfig,
}

impl Scanner {
    pub fn new() -> Result<Self, ScannerError> {
        Self::with_config(ScanConfig::default())
    }

    pub fn with_config(config: ScanConfig) -> Result<Self, ScannerError> {
        Ok(Self {
            catalog: Arc::new(SignatureCatalog::builtin()?),
            config,
        })
    }

    /// Scan a single file and produce a verdict.
    ///
    /// Never returns an error: every failure mode while analyzing an
    /// untrusted file is captured as an issue in the result. The reported
    /// path is always absolute, even when the input was relative or missing.
    pub async fn scan(&self, path: impl AsRef<Path>) -> ScanResult {
        let file = absolutize(path.as_ref());

        if !file.is_file() {
            return ScanResult::from_issues(
                file,
                vec![Issue::new(
                    Severity::High,
                    "Node path does not exist or is not a file.",
                )],
            );
        }

        let source = match tokio::fs::read(&file).await {
            // Undecodable bytes become replacement characters rather than
            // aborting the scan.
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(error) => {
                return ScanResult::from_issues(
                    file,
                    vec![Issue::new(
                        Severity::High,
                        format!("Failed to read file: {error}"),
                    )],
                );
            }
        };

        tracing::debug!("scanning {}", file.display());
        let mut issues = Vec::new();

        let analyzer = StaticAnalyzer::new(Arc::clone(&self.catalog));
        issues.extend(analyzer.analyze(&source, &file));

        if self.config.run_linter {
            issues.extend(linter::run(&file).await);
        }

        if self.config.run_sandbox {
            let sandbox = SandboxRuntime::new(SandboxConfig {
                timeout: self.config.sandbox_timeout,
                interpreter: self.config.python_interpreter.clone(),
            });
            issues.extend(sandbox.run(&file).await);
        }

        ScanResult::from_issues(file, issues)
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn static_only() -> ScanConfig {
        ScanConfig {
            run_linter: false,
            run_sandbox: false,
            ..ScanConfig::default()
        }
    }

    fn write_script(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn missing_file_is_single_high_issue() {
        let scanner = Scanner::with_config(static_only()).unwrap();
        let result = scanner.scan("definitely/not/here.py").await;
        assert!(!result.secure);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::High);
        assert!(result.file.is_absolute());
    }

    #[tokio::test]
    async fn clean_file_is_secure() {
        let script = write_script("NODE_NAME = 'resize'\n");
        let scanner = Scanner::with_config(static_only()).unwrap();
        let result = scanner.scan(script.path()).await;
        assert!(result.secure);
        assert!(result.issues.is_empty());
        assert!(result.file.is_absolute());
    }

    #[tokio::test]
    async fn socket_import_alone_flips_verdict() {
        let script = write_script("import socket\n");
        let scanner = Scanner::with_config(static_only()).unwrap();
        let result = scanner.scan(script.path()).await;
        assert!(!result.secure);
        let mediums: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Medium)
            .collect();
        assert_eq!(mediums.len(), 1);
        assert!(mediums[0].detail.contains("'socket'"));
    }

    #[tokio::test]
    async fn low_only_issues_stay_secure() {
        let script = write_script("import os\n");
        let scanner = Scanner::with_config(static_only()).unwrap();
        let result = scanner.scan(script.path()).await;
        assert!(result.secure);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn undecodable_bytes_are_replaced_not_fatal() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(b"import socket\n# \xff\xfe\n").unwrap();
        file.flush().unwrap();
        let scanner = Scanner::with_config(static_only()).unwrap();
        let result = scanner.scan(file.path()).await;
        assert!(result
            .issues
            .iter()
            .any(|i| i.detail.contains("'socket'")));
    }

    #[tokio::test]
    async fn repeated_scans_are_idempotent() {
        let script = write_script(
            "import subprocess\nsubprocess.run([\"pip\", \"install\", \"evil\"])\nimport socket\n",
        );
        let scanner = Scanner::with_config(static_only()).unwrap();
        let first = scanner.scan(script.path()).await;
        let second = scanner.scan(script.path()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn result_serializes_to_contract_shape() {
        let script = write_script("import socket\n");
        let scanner = Scanner::with_config(static_only()).unwrap();
        let result = scanner.scan(script.path()).await;
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["file"].is_string());
        assert!(json["issues"].is_array());
        assert_eq!(json["secure"], serde_json::Value::Bool(false));
        assert_eq!(json["issues"][0]["severity"], "MEDIUM");
    }

    #[tokio::test]
    async fn socket_import_end_to_end_is_one_static_medium() {
        if which::which("python3").or_else(|_| which::which("python")).is_err() {
            return;
        }
        let script = write_script("import socket\n");
        let config = ScanConfig {
            run_linter: false,
            ..ScanConfig::default()
        };
        let scanner = Scanner::with_config(config).unwrap();
        let result = scanner.scan(script.path()).await;
        assert!(!result.secure);
        // The dynamic layer contributes nothing: importing socket never
        // constructs one, so no interceptor fires. The single issue is the
        // static import finding.
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Medium);
        assert_eq!(
            result.issues[0].detail,
            "Imports risky module 'socket'. (line 1)"
        );
    }

    #[tokio::test]
    async fn end_to_end_with_sandbox_when_python_present() {
        if which::which("python3").or_else(|_| which::which("python")).is_err() {
            return;
        }
        let script = write_script("import os\nos.system('id')\n");
        let config = ScanConfig {
            run_linter: false,
            ..ScanConfig::default()
        };
        let scanner = Scanner::with_config(config).unwrap();
        let result = scanner.scan(script.path()).await;
        assert!(!result.secure);
        // Static layer flags the call site; dynamic layer observes the
        // attempted invocation.
        assert!(result
            .issues
            .iter()
            .any(|i| i.detail.starts_with("Uses os.system()")));
        assert!(result
            .issues
            .iter()
            .any(|i| i.detail.starts_with("Runtime call blocked: os.system")));
    }
}
