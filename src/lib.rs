//! nodescan: pre-execution security triage for untrusted Python node
//! scripts.
//!
//! Given a single plugin-style script submitted by a third party, nodescan
//! produces a verdict (secure or not) backed by a list of issues, each
//! with a severity and a human-readable detail. Two detection layers feed
//! one unified issue model:
//!
//! - a **static layer** that parses the script into a syntax tree and a
//!   line-oriented text view and matches both against a catalog of risk
//!   signatures (risky imports, dangerous calls, obfuscation heuristics,
//!   known-malicious indicators), plus an optional Bandit pass;
//! - a **dynamic layer** that imports the script's module-level code inside
//!   an isolated, time-bounded interpreter whose process-spawn, socket, and
//!   HTTP entry points are replaced with interceptors that record attempts
//!   instead of performing them.
//!
//! ```no_run
//! use nodescan::Scanner;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), nodescan::ScannerError> {
//! let scanner = Scanner::new()?;
//! let result = scanner.scan("custom_nodes/suspicious.py").await;
//! if !result.secure {
//!     for issue in &result.issues {
//!         eprintln!("[{}] {}", issue.severity, issue.detail);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzers;
pub mod linter;
pub mod sandbox;
pub mod scanner;
pub mod signatures;
pub mod types;

pub use sandbox::{SandboxConfig, SandboxRuntime};
pub use scanner::{ScanConfig, Scanner, ScannerError};
pub use signatures::SignatureCatalog;
pub use types::{Issue, ScanResult, Severity};
