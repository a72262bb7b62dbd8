//! Syntax-tree primitives for the static rule engine.
//!
//! Wraps the tree-sitter Python grammar with the small set of walks the
//! engine needs: resolving a call's dotted target back to a root identifier,
//! collecting top-level import names, and extracting every string literal
//! reachable from a call's arguments.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

#[derive(Debug, Error)]
pub enum AstError {
    #[error("failed to load Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("parser produced no syntax tree")]
    NoTree,
}

/// Parse Python source. tree-sitter is error-tolerant, so this only fails on
/// grammar-load problems; syntax errors surface as error nodes in the tree.
pub fn parse(source: &str) -> Result<Tree, AstError> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
    parser.parse(source, None).ok_or(AstError::NoTree)
}

/// 1-indexed source line of a node.
pub fn node_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Line of the first error or missing node, if the tree contains one.
pub fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node_line(node));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    None
}

/// Top-level module names introduced by an import statement.
///
/// `import a.b, c` yields `["a", "c"]`; `from x.y import z` yields `["x"]`.
/// Relative imports (`from . import z`) name no external module and yield
/// nothing.
pub fn imported_top_level_modules(node: Node, source: &str) -> Vec<String> {
    let mut modules = Vec::new();
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let dotted = if name.kind() == "aliased_import" {
                    name.child_by_field_name("name")
                } else {
                    Some(name)
                };
                if let Some(module) = dotted.and_then(|n| top_level_name(n, source)) {
                    modules.push(module);
                }
            }
        }
        "import_from_statement" => {
            if let Some(module_name) = node.child_by_field_name("module_name") {
                if module_name.kind() == "dotted_name" {
                    if let Some(module) = top_level_name(module_name, source) {
                        modules.push(module);
                    }
                }
            }
        }
        _ => {}
    }
    modules
}

fn top_level_name(node: Node, source: &str) -> Option<String> {
    let text = node.utf8_text(source.as_bytes()).ok()?;
    text.split('.').next().map(str::to_string)
}

/// Resolve a call's target to its fully-qualified dotted name by following
/// attribute-access chains back to a root identifier.
///
/// Returns `None` when the root is not a plain identifier (e.g. the result
/// of another call or a subscript); such calls are skipped rather than
/// guessed at.
pub fn resolve_call_name(func: Node, source: &str) -> Option<String> {
    match func.kind() {
        "identifier" => func
            .utf8_text(source.as_bytes())
            .ok()
            .map(str::to_string),
        "attribute" => {
            let base = resolve_call_name(func.child_by_field_name("object")?, source)?;
            let attr = func
                .child_by_field_name("attribute")?
                .utf8_text(source.as_bytes())
                .ok()?;
            Some(format!("{base}.{attr}"))
        }
        _ => None,
    }
}

/// Every string literal reachable from `node`, through literal sequences,
/// mappings, formatted-string fragments, keyword arguments, and nested calls.
pub fn extract_string_literals(node: Node, source: &str) -> Vec<String> {
    let mut literals = Vec::new();
    collect_literals(node, source, &mut literals);
    literals
}

fn collect_literals(node: Node, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "string" => collect_string_fragments(node, source, out),
        "concatenated_string"
        | "list"
        | "tuple"
        | "set"
        | "dictionary"
        | "pair"
        | "parenthesized_expression"
        | "argument_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_literals(child, source, out);
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_literals(value, source, out);
            }
        }
        "call" => {
            if let Some(arguments) = node.child_by_field_name("arguments") {
                collect_literals(arguments, source, out);
            }
        }
        _ => {}
    }
}

/// Gather the constant fragments of a string node. Interpolated f-string
/// segments split the constant text into separate literals, matching how
/// the fragments would be seen at runtime.
fn collect_string_fragments(node: Node, source: &str, out: &mut Vec<String>) {
    let mut buffer = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string_content" => {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    buffer.push_str(text);
                }
            }
            "escape_sequence" => {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    push_decoded_escape(text, &mut buffer);
                }
            }
            "interpolation" => {
                if !buffer.is_empty() {
                    out.push(std::mem::take(&mut buffer));
                }
            }
            _ => {}
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
}

/// Decode one Python escape sequence to its runtime value, so extracted
/// literals compare the way they would at runtime (`"pip\x20install"` must
/// match the same signatures as `"pip install"`). Unrecognized escapes keep
/// their raw spelling, as Python itself does.
fn push_decoded_escape(text: &str, buffer: &mut String) {
    let mut chars = text.chars();
    let (Some('\\'), Some(kind)) = (chars.next(), chars.next()) else {
        buffer.push_str(text);
        return;
    };
    match kind {
        'n' => buffer.push('\n'),
        't' => buffer.push('\t'),
        'r' => buffer.push('\r'),
        'a' => buffer.push('\x07'),
        'b' => buffer.push('\x08'),
        'f' => buffer.push('\x0c'),
        'v' => buffer.push('\x0b'),
        '\\' | '\'' | '"' => buffer.push(kind),
        // Backslash-newline is a line continuation inside the literal.
        '\n' => {}
        '0'..='7' => {
            let digits: String = std::iter::once(kind).chain(chars).collect();
            match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                Some(decoded) => buffer.push(decoded),
                None => buffer.push_str(text),
            }
        }
        'x' | 'u' | 'U' => {
            match u32::from_str_radix(chars.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
            {
                Some(decoded) => buffer.push(decoded),
                None => buffer.push_str(text),
            }
        }
        _ => buffer.push_str(text),
    }
}
