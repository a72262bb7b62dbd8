//! Built-in risk signatures: imports, call targets, line patterns, and
//! known-malicious indicators.
//!
//! This is the single place where severities and issue wording are tuned.
//! The tables are pure data; the static engine consumes them.

use crate::types::Severity;
use regex::Regex;

/// Module imports worth flagging, keyed by top-level module name.
pub const RISKY_IMPORTS: &[(&str, Severity)] = &[
    ("os", Severity::Low),
    ("subprocess", Severity::Medium),
    ("socket", Severity::Medium),
    ("winreg", Severity::Medium),
    ("ctypes", Severity::Medium),
    ("requests", Severity::Low),
    ("urllib", Severity::Low),
];

/// Fully-qualified call targets that are flagged whenever they appear.
///
/// eval/exec/shell-exec are always HIGH; explicit process-run APIs are
/// flagged as capability use at MEDIUM.
pub const DANGEROUS_CALLS: &[(&str, Severity, &str)] = &[
    (
        "eval",
        Severity::High,
        "Uses eval() for dynamic code execution.",
    ),
    (
        "exec",
        Severity::High,
        "Uses exec() for dynamic code execution.",
    ),
    (
        "os.system",
        Severity::High,
        "Uses os.system() to execute shell commands.",
    ),
    (
        "subprocess.Popen",
        Severity::High,
        "Uses subprocess.Popen() to spawn a process.",
    ),
    (
        "subprocess.run",
        Severity::Medium,
        "Uses subprocess.run() to execute a process.",
    ),
    (
        "subprocess.call",
        Severity::Medium,
        "Uses subprocess.call() to execute a process.",
    ),
];

/// Resolved call names that denote an outbound network request.
pub const NETWORK_CALL_TARGETS: &[&str] = &[
    "requests.get",
    "requests.post",
    "requests.put",
    "requests.delete",
    "requests.request",
    "urllib.request.urlopen",
    "urllib.urlopen",
];

/// Resolved call names that spawn a process or run a shell command; their
/// string arguments are additionally inspected for package installation.
pub const PROCESS_CALL_TARGETS: &[&str] = &[
    "subprocess.run",
    "subprocess.call",
    "subprocess.Popen",
    "os.system",
];

/// Look up the severity for a risky top-level import.
pub fn risky_import(module: &str) -> Option<Severity> {
    RISKY_IMPORTS
        .iter()
        .find(|(name, _)| *name == module)
        .map(|(_, severity)| *severity)
}

/// Look up the configured issue for a dangerous call target.
pub fn dangerous_call(name: &str) -> Option<(Severity, &'static str)> {
    DANGEROUS_CALLS
        .iter()
        .find(|(target, _, _)| *target == name)
        .map(|(_, severity, message)| (*severity, *message))
}

/// True when a resolved call name denotes an outbound network request.
pub fn is_network_call(name: &str) -> bool {
    NETWORK_CALL_TARGETS.contains(&name) || name.starts_with("urllib.")
}

/// True when a resolved call name spawns a process or shell.
pub fn is_process_call(name: &str) -> bool {
    PROCESS_CALL_TARGETS.contains(&name)
}

/// A compiled line-level pattern with its configured issue.
#[derive(Debug)]
pub struct LinePattern {
    pub regex: Regex,
    pub severity: Severity,
    pub message: &'static str,
}

impl LinePattern {
    fn new(pattern: &str, severity: Severity, message: &'static str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            severity,
            message,
        })
    }
}

/// Compiled signature catalog, built once and shared read-only across scans.
#[derive(Debug)]
pub struct SignatureCatalog {
    /// Matches http(s) URLs.
    pub url: Regex,
    /// Matches dotted-quad IPv4 literals.
    pub ipv4: Regex,
    /// Contiguous base64-like blob of 200+ characters (obfuscation signal).
    pub base64_blob: Regex,
    /// `pip install` / `pip3 install` invocation string.
    pub pip_install: Regex,
    /// A bare `pip` / `pipN` token, matched against extracted call literals.
    pub pip_token: Regex,
    /// Assignment to an identifier of 30+ characters; flagged when the name
    /// also contains a digit.
    pub obfuscated_assign: Regex,
    /// Known-malicious substrings (webhooks, mining pools).
    pub indicators: Vec<LinePattern>,
    /// Dangerous call shapes matched on raw lines, independent of the tree
    /// walk so unparseable input still gets coverage.
    pub call_lines: Vec<LinePattern>,
}

impl SignatureCatalog {
    /// Compile the built-in catalog.
    pub fn builtin() -> Result<Self, regex::Error> {
        Ok(Self {
            url: Regex::new(r#"(?i)https?://[^\s'"\\)]+"#)?,
            ipv4: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")?,
            base64_blob: Regex::new(r"[A-Za-z0-9+/]{200,}={0,2}")?,
            pip_install: Regex::new(r"(?i)\bpip3?\s+install\b")?,
            pip_token: Regex::new(r"(?i)^pip\d*$")?,
            obfuscated_assign: Regex::new(r"^[ \t]*([A-Za-z_][A-Za-z0-9_]{29,})\s*=")?,
            indicators: vec![
                LinePattern::new(
                    r"(?i)discord(app)?\.com/api/webhooks",
                    Severity::High,
                    "Discord webhook URL found.",
                )?,
                LinePattern::new(
                    r"(?i)stratum\+tcp://",
                    Severity::High,
                    "Possible mining pool (stratum) URL found.",
                )?,
                LinePattern::new(
                    r"(?i)\b(nicehash|nanopool|ethermine|minergate|supportxmr|f2pool|2miners|viabtc|slushpool)\b",
                    Severity::High,
                    "Known crypto-mining pool reference found.",
                )?,
            ],
            call_lines: vec![
                LinePattern::new(
                    r"\beval\s*\(",
                    Severity::High,
                    "Uses eval() for dynamic code execution.",
                )?,
                LinePattern::new(
                    r"\bexec\s*\(",
                    Severity::High,
                    "Uses exec() for dynamic code execution.",
                )?,
                LinePattern::new(
                    r"\bos\.system\s*\(",
                    Severity::High,
                    "Uses os.system() to execute shell commands.",
                )?,
                LinePattern::new(
                    r"\bsubprocess\.Popen\s*\(",
                    Severity::High,
                    "Uses subprocess.Popen() to spawn a process.",
                )?,
                LinePattern::new(
                    r"\bsubprocess\.(run|call)\s*\(",
                    Severity::Medium,
                    "Uses subprocess to execute a process.",
                )?,
            ],
        })
    }
}
