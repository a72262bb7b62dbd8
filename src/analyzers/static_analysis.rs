//! Static rule engine: a syntax-tree pass and a line-oriented regex pass
//! over the same source text, merged with local deduplication.
//!
//! The engine never fails a scan. A syntax error degrades to one MEDIUM
//! issue and skips the tree walk (the line scan still runs, which is the
//! only coverage available for unparseable or heavily obfuscated input);
//! an internal fault degrades to one LOW diagnostic.

use super::ast;
use crate::signatures::{self, SignatureCatalog};
use crate::types::{Issue, Severity};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tree_sitter::Node;

/// Collects issues in emission order, collapsing identical
/// (severity, rendered detail) pairs.
struct IssueCollector {
    issues: Vec<Issue>,
    seen: HashSet<(Severity, String)>,
}

impl IssueCollector {
    fn new() -> Self {
        Self {
            issues: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, severity: Severity, detail: String, line: Option<usize>) {
        let detail = match line {
            Some(line) => format!("{detail} (line {line})"),
            None => detail,
        };
        if self.seen.insert((severity, detail.clone())) {
            self.issues.push(Issue { severity, detail });
        }
    }

    fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

/// The static layer of a scan.
pub struct StaticAnalyzer {
    catalog: Arc<SignatureCatalog>,
}

impl StaticAnalyzer {
    pub fn new(catalog: Arc<SignatureCatalog>) -> Self {
        Self { catalog }
    }

    /// Run both passes over `source`. `path` is used only for diagnostics.
    pub fn analyze(&self, source: &str, path: &Path) -> Vec<Issue> {
        let mut out = IssueCollector::new();

        if let Err(error) = self.tree_pass(source, &mut out) {
            tracing::warn!("syntax-tree pass unavailable for {}: {error}", path.display());
            out.push(
                Severity::Low,
                format!("Static syntax-tree analysis unavailable: {error}"),
                None,
            );
        }

        self.line_pass(source, &mut out);
        out.into_issues()
    }

    fn tree_pass(&self, source: &str, out: &mut IssueCollector) -> Result<(), ast::AstError> {
        let tree = ast::parse(source)?;
        let root = tree.root_node();

        if root.has_error() {
            out.push(
                Severity::Medium,
                "Failed to parse Python source: invalid syntax.".to_string(),
                ast::first_error_line(root),
            );
            return Ok(());
        }

        let mut reported_imports = HashSet::new();
        self.walk(root, source, out, &mut reported_imports);
        Ok(())
    }

    fn walk(
        &self,
        node: Node,
        source: &str,
        out: &mut IssueCollector,
        reported_imports: &mut HashSet<String>,
    ) {
        match node.kind() {
            "import_statement" | "import_from_statement" => {
                let line = ast::node_line(node);
                for module in ast::imported_top_level_modules(node, source) {
                    // One issue per distinct risky import, first occurrence
                    // wins even when later imports sit on other lines.
                    if let Some(severity) = signatures::risky_import(&module) {
                        if reported_imports.insert(module.clone()) {
                            out.push(
                                severity,
                                format!("Imports risky module '{module}'."),
                                Some(line),
                            );
                        }
                    }
                }
            }
            "call" => self.check_call(node, source, out),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, out, reported_imports);
        }
    }

    fn check_call(&self, call: Node, source: &str, out: &mut IssueCollector) {
        let Some(func) = call.child_by_field_name("function") else {
            return;
        };
        // Calls whose root is not a plain identifier are skipped entirely:
        // no issue, no false positive.
        let Some(name) = ast::resolve_call_name(func, source) else {
            return;
        };
        let line = ast::node_line(call);

        if let Some((severity, message)) = signatures::dangerous_call(&name) {
            out.push(severity, message.to_string(), Some(line));
        }

        if signatures::is_network_call(&name) {
            out.push(
                Severity::Medium,
                format!("Network call via '{name}'."),
                Some(line),
            );
            for literal in ast::extract_string_literals(call, source) {
                if self.catalog.url.is_match(&literal) || self.catalog.ipv4.is_match(&literal) {
                    out.push(
                        Severity::Medium,
                        format!("Network call target appears in code: {literal}."),
                        Some(line),
                    );
                }
            }
        }

        if signatures::is_process_call(&name)
            && self.call_invokes_pip(&ast::extract_string_literals(call, source))
        {
            out.push(
                Severity::High,
                "Invokes pip install at runtime.".to_string(),
                Some(line),
            );
        }
    }

    /// Package-installer invocation signature: a literal `pip install`
    /// phrase, or a bare pip token alongside a sibling `install` literal.
    fn call_invokes_pip(&self, literals: &[String]) -> bool {
        let values: Vec<String> = literals.iter().map(|v| v.to_lowercase()).collect();
        if values.join(" ").contains("pip install") {
            return true;
        }
        values.iter().any(|v| self.catalog.pip_token.is_match(v))
            && values.iter().any(|v| v == "install")
    }

    fn line_pass(&self, source: &str, out: &mut IssueCollector) {
        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;

            if self.catalog.pip_install.is_match(line) {
                out.push(
                    Severity::High,
                    "Contains 'pip install' invocation string.".to_string(),
                    Some(line_no),
                );
            }

            if self.catalog.base64_blob.is_match(line) {
                out.push(
                    Severity::Medium,
                    "Large base64-like string found (possible obfuscation).".to_string(),
                    Some(line_no),
                );
            }

            if let Some(captures) = self.catalog.obfuscated_assign.captures(line) {
                if captures[1].chars().any(|c| c.is_ascii_digit()) {
                    out.push(
                        Severity::Low,
                        "Unusually long variable name with digits (possible obfuscation)."
                            .to_string(),
                        Some(line_no),
                    );
                }
            }

            for indicator in &self.catalog.indicators {
                if indicator.regex.is_match(line) {
                    out.push(indicator.severity, indicator.message.to_string(), Some(line_no));
                }
            }

            if line.contains("requests.") || line.contains("urllib") {
                if let Some(url) = self.catalog.url.find(line) {
                    out.push(
                        Severity::Medium,
                        format!("Hard-coded URL in network call: {}.", url.as_str()),
                        Some(line_no),
                    );
                }
                if let Some(ip) = self.catalog.ipv4.find(line) {
                    out.push(
                        Severity::Medium,
                        format!("Hard-coded IP in network call: {}.", ip.as_str()),
                        Some(line_no),
                    );
                }
            }

            for pattern in &self.catalog.call_lines {
                if pattern.regex.is_match(line) {
                    out.push(pattern.severity, pattern.message.to_string(), Some(line_no));
                }
            }
        }
    }
}
