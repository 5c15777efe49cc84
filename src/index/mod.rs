// Index storage and data model

pub mod annotate;
pub mod capture;
pub mod paths;
pub mod store;
pub mod symbols;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::analysis::centrality::CentralityReport;
use crate::analysis::coupling::CouplingReport;
use crate::analysis::duplicates::DuplicateGroup;
use crate::analysis::flow::FlowReport;

pub use capture::{Capture, Fidelity, Param, Signature};
pub use symbols::SymbolTable;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    File,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::File => "file",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// Unique address of a symbol: owning file plus qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub file: String,
    pub qualified_name: String,
}

impl SymbolKey {
    pub fn new(file: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            qualified_name: qualified_name.into(),
        }
    }

    /// Parse the `file:qualified_name` rendering. Qualified names never
    /// contain `:`, so the last colon is the separator.
    pub fn parse(s: &str) -> Option<Self> {
        let (file, qualified_name) = s.rsplit_once(':')?;
        if file.is_empty() || qualified_name.is_empty() {
            return None;
        }
        Some(Self::new(file, qualified_name))
    }

    /// The bare name: last dotted segment of the qualified name.
    pub fn bare_name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.qualified_name)
    }
}

impl Serialize for SymbolKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SymbolKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SymbolKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid symbol key: {}", raw)))
    }
}

/// A function, method or class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_hash: Option<String>,
    /// Fields owned by external collaborators (summaries and the like).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Symbol {
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.file, &self.qualified_name)
    }
}

/// One scanned file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub category: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub line_count: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// Module-level calls of a file run as a script (`__main__` guard).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_calls: Vec<String>,
    #[serde(default)]
    pub symbols: Vec<SymbolKey>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outgoing raw calls of one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphEntry {
    pub file: String,
    pub line: u32,
    pub calls: Vec<String>,
}

/// HTTP endpoint declared in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub file: String,
    pub line: u32,
}

/// Symbols grouped by kind, as serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSet {
    #[serde(default)]
    pub functions: Vec<Symbol>,
    #[serde(default)]
    pub classes: Vec<Symbol>,
    #[serde(default)]
    pub methods: Vec<Symbol>,
}

impl SymbolSet {
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.functions
            .iter()
            .chain(self.classes.iter())
            .chain(self.methods.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.functions
            .iter_mut()
            .chain(self.classes.iter_mut())
            .chain(self.methods.iter_mut())
    }

    pub fn push(&mut self, symbol: Symbol) {
        match symbol.kind {
            SymbolKind::Function | SymbolKind::File => self.functions.push(symbol),
            SymbolKind::Class => self.classes.push(symbol),
            SymbolKind::Method => self.methods.push(symbol),
        }
    }

    pub fn retain<F: FnMut(&Symbol) -> bool>(&mut self, mut keep: F) {
        self.functions.retain(&mut keep);
        self.classes.retain(&mut keep);
        self.methods.retain(&mut keep);
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.classes.len() + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sort(&mut self) {
        for list in [&mut self.functions, &mut self.classes, &mut self.methods] {
            list.sort_by(|a, b| {
                (&a.file, a.line, &a.qualified_name).cmp(&(&b.file, b.line, &b.qualified_name))
            });
        }
    }
}

/// Added/updated/deleted counts of the last scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCounts {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCounts {
    pub files: usize,
    pub functions: usize,
    pub classes: usize,
    pub methods: usize,
    pub call_graph_entries: usize,
    pub endpoints: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub generated_at: String,
    pub tool_version: String,
    pub root: String,
    #[serde(default)]
    pub last_update: UpdateCounts,
    #[serde(default)]
    pub counts: IndexCounts,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The aggregate root persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub meta: Meta,
    pub files: Vec<FileRecord>,
    pub symbols: SymbolSet,
    pub call_graph: BTreeMap<SymbolKey, CallGraphEntry>,
    #[serde(default)]
    pub api_endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub centrality: CentralityReport,
    #[serde(default)]
    pub execution_flow: FlowReport,
    #[serde(default)]
    pub coupling: CouplingReport,
    #[serde(default)]
    pub potential_duplicates: Vec<DuplicateGroup>,
    /// Blocks written by other tools (embeddings, semantic search, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Index {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            meta: Meta {
                generated_at: now_rfc3339(),
                tool_version: TOOL_VERSION.to_string(),
                root: root.into(),
                last_update: UpdateCounts::default(),
                counts: IndexCounts::default(),
                extra: Map::new(),
            },
            files: Vec::new(),
            symbols: SymbolSet::default(),
            call_graph: BTreeMap::new(),
            api_endpoints: Vec::new(),
            centrality: CentralityReport::default(),
            execution_flow: FlowReport::default(),
            coupling: CouplingReport::default(),
            potential_duplicates: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn symbols_in_file<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |s| s.file == path)
    }

    /// Drop every record owned by `path`: the file itself, its symbols,
    /// call graph entries and endpoints.
    pub fn remove_file(&mut self, path: &str) {
        self.files.retain(|f| f.path != path);
        self.symbols.retain(|s| s.file != path);
        self.call_graph.retain(|key, _| key.file != path);
        self.api_endpoints.retain(|e| e.file != path);
    }

    /// Restore canonical ordering so equal content serializes identically.
    pub fn normalize(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        self.symbols.sort();
        self.api_endpoints.sort_by(|a, b| {
            (&a.file, a.line, &a.method, &a.path).cmp(&(&b.file, b.line, &b.method, &b.path))
        });
    }

    pub fn refresh_counts(&mut self) {
        self.meta.counts = IndexCounts {
            files: self.files.len(),
            functions: self.symbols.functions.len(),
            classes: self.symbols.classes.len(),
            methods: self.symbols.methods.len(),
            call_graph_entries: self.call_graph.len(),
            endpoints: self.api_endpoints.len(),
        };
    }

    pub fn touch(&mut self) {
        self.meta.generated_at = now_rfc3339();
        self.meta.tool_version = TOOL_VERSION.to_string();
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::symbol;

    #[test]
    fn test_symbol_key_roundtrip() {
        let key = SymbolKey::new("pkg/a.py", "Foo.bar");
        assert_eq!(key.to_string(), "pkg/a.py:Foo.bar");
        assert_eq!(SymbolKey::parse("pkg/a.py:Foo.bar"), Some(key.clone()));
        assert_eq!(key.bare_name(), "bar");
        assert_eq!(SymbolKey::parse("no-separator"), None);
    }

    #[test]
    fn test_symbol_extras_preserved() {
        let raw = serde_json::json!({
            "name": "foo",
            "qualifiedName": "foo",
            "kind": "function",
            "file": "a.py",
            "line": 1,
            "summary": "Does foo things",
            "summarySource": "llm"
        });
        let sym: Symbol = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(sym.extra.get("summary"), Some(&Value::from("Does foo things")));
        assert_eq!(serde_json::to_value(&sym).unwrap(), raw);
    }

    #[test]
    fn test_remove_file() {
        let mut index = Index::new(".");
        index.symbols.push(symbol("a.py", "foo", SymbolKind::Function, 1));
        index.symbols.push(symbol("b.py", "bar", SymbolKind::Function, 1));
        index.call_graph.insert(
            SymbolKey::new("b.py", "bar"),
            CallGraphEntry {
                file: "b.py".to_string(),
                line: 1,
                calls: vec!["foo".to_string()],
            },
        );
        index.remove_file("b.py");
        assert_eq!(index.symbols.len(), 1);
        assert!(index.call_graph.is_empty());
    }

    #[test]
    fn test_call_graph_keys_serialize_as_strings() {
        let mut index = Index::new(".");
        index.call_graph.insert(
            SymbolKey::new("a.py", "foo"),
            CallGraphEntry {
                file: "a.py".to_string(),
                line: 1,
                calls: vec!["bar".to_string()],
            },
        );
        let value = serde_json::to_value(&index).unwrap();
        assert_eq!(value["callGraph"]["a.py:foo"]["calls"][0], "bar");
        let back: Index = serde_json::from_value(value).unwrap();
        assert_eq!(back.call_graph.len(), 1);
    }
}
