// Language parsers

pub mod fallback;
pub mod go;
pub mod java;
pub mod python;
pub mod rust;

use tree_sitter::{Language, Node, Parser as TreeParser, Tree};

use crate::index::Capture;

pub use go::GoParser;
pub use java::JavaParser;
pub use python::PythonParser;
pub use rust::RustParser;

/// A per-language extractor turning file contents into a [`Capture`].
///
/// Implementations hold only static configuration. Every call to `scan`
/// builds its own tree-sitter parser, so results depend on the given bytes
/// alone and parsers can be shared across worker threads.
pub trait LanguageParser: Send + Sync {
    /// Language name recorded on file records.
    fn language(&self) -> &str;

    /// File extensions owned by this parser, lowercase, without the dot.
    fn extensions(&self) -> &[&str];

    fn scan(&self, source: &[u8]) -> anyhow::Result<Capture>;
}

pub(crate) fn parse_tree(language: Language, source: &[u8], name: &str) -> anyhow::Result<Tree> {
    let mut parser = TreeParser::new();
    parser.set_language(&language)?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse {} code", name))?;

    Ok(tree)
}

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn field_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
        .filter(|s| !s.is_empty())
}

/// 1-based start line.
pub(crate) fn start_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line.
pub(crate) fn end_line(node: Node) -> Option<u32> {
    Some(node.end_position().row as u32 + 1)
}

/// Collapse whitespace runs so multi-line annotations read as one line.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Structural hash of a body: the sequence of leaf tokens with comments
/// dropped, so formatting and comment changes do not alter it. Bodies under
/// three lines are too small to call duplicates and get no hash.
pub(crate) fn body_hash(body: Node, source: &[u8], skip: Option<Node>) -> Option<String> {
    let lines = body.end_position().row.saturating_sub(body.start_position().row) + 1;
    if lines < 3 {
        return None;
    }

    let mut hasher = blake3::Hasher::new();
    let mut tokens = 0usize;
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if Some(node) == skip || node.kind().contains("comment") {
            continue;
        }
        if node.child_count() == 0 {
            hasher.update(node.kind().as_bytes());
            hasher.update(b"\x1f");
            hasher.update(node_text(node, source).as_bytes());
            hasher.update(b"\x1e");
            tokens += 1;
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    if tokens == 0 {
        return None;
    }
    let hex = hasher.finalize().to_hex();
    Some(format!("blake3:{}", &hex.as_str()[..16]))
}

/// Consecutive comment siblings directly above `node` whose text starts with
/// `marker`, with the markers stripped.
pub(crate) fn leading_doc_comment(node: Node, source: &[u8], marker: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_named_sibling();
    let mut expected_row = node.start_position().row;
    while let Some(sibling) = current {
        if !sibling.kind().contains("comment") || sibling.end_position().row + 1 < expected_row {
            if sibling.kind() == "attribute_item" {
                expected_row = sibling.start_position().row;
                current = sibling.prev_named_sibling();
                continue;
            }
            break;
        }
        let text = node_text(sibling, source).trim();
        if !text.starts_with(marker) {
            break;
        }
        lines.push(clean_comment(text, marker));
        expected_row = sibling.start_position().row;
        current = sibling.prev_named_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn clean_comment(text: &str, marker: &str) -> String {
    let body = text.strip_prefix(marker).unwrap_or(text);
    let body = body.strip_suffix("*/").unwrap_or(body);
    body.lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
