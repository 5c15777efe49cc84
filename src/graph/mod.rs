// Call graph: raw entries per symbol and the resolved view built on them

pub mod resolver;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::index::{CallGraphEntry, Index, Symbol, SymbolKey};

pub use resolver::{CallResolver, Resolution};

/// The stored entry for a symbol, if it makes any calls.
pub fn entry_for(symbol: &Symbol) -> Option<(SymbolKey, CallGraphEntry)> {
    if symbol.calls.is_empty() {
        return None;
    }
    Some((
        symbol.key(),
        CallGraphEntry {
            file: symbol.file.clone(),
            line: symbol.line,
            calls: symbol.calls.clone(),
        },
    ))
}

/// Entries for every symbol with calls.
pub fn build_entries<'a, I>(symbols: I) -> BTreeMap<SymbolKey, CallGraphEntry>
where
    I: IntoIterator<Item = &'a Symbol>,
{
    symbols.into_iter().filter_map(entry_for).collect()
}

/// One raw call of a caller and what it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub raw: String,
    pub target: Resolution,
}

/// Resolved call graph over an index, rebuilt on demand from the stored
/// entries. Forward edges keep the caller's call order.
#[derive(Debug, Default)]
pub struct CallGraph {
    forward: BTreeMap<SymbolKey, Vec<Edge>>,
    reverse: HashMap<SymbolKey, BTreeSet<SymbolKey>>,
    external: BTreeMap<String, BTreeSet<SymbolKey>>,
}

impl CallGraph {
    pub fn build(index: &Index) -> Self {
        let resolver = CallResolver::new(&index.symbols);
        let mut graph = CallGraph::default();

        for (caller, entry) in &index.call_graph {
            let mut edges = Vec::with_capacity(entry.calls.len());
            for raw in &entry.calls {
                let target = resolver.resolve(&caller.file, raw);
                match &target {
                    Resolution::Resolved(callee) => {
                        graph
                            .reverse
                            .entry(callee.clone())
                            .or_default()
                            .insert(caller.clone());
                    }
                    Resolution::External(name) => {
                        graph
                            .external
                            .entry(name.clone())
                            .or_default()
                            .insert(caller.clone());
                    }
                }
                edges.push(Edge {
                    raw: raw.clone(),
                    target,
                });
            }
            graph.forward.insert(caller.clone(), edges);
        }

        graph
    }

    /// Outgoing edges of `caller`, in call order.
    pub fn edges(&self, caller: &SymbolKey) -> &[Edge] {
        self.forward.get(caller).map(|e| e.as_slice()).unwrap_or(&[])
    }

    /// Distinct resolved callees of `caller`, in first-call order.
    pub fn callees(&self, caller: &SymbolKey) -> Vec<&SymbolKey> {
        let mut seen = BTreeSet::new();
        self.edges(caller)
            .iter()
            .filter_map(|e| match &e.target {
                Resolution::Resolved(key) if seen.insert(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Callers of `callee`, sorted. External names never appear here.
    pub fn callers(&self, callee: &SymbolKey) -> impl Iterator<Item = &SymbolKey> {
        self.reverse.get(callee).into_iter().flatten()
    }

    /// Distinct resolved callers, self-recursion excluded.
    pub fn in_degree(&self, key: &SymbolKey) -> usize {
        self.callers(key).filter(|caller| *caller != key).count()
    }

    /// Callers of an unresolved name.
    pub fn external_callers(&self, name: &str) -> impl Iterator<Item = &SymbolKey> {
        self.external.get(name).into_iter().flatten()
    }

    pub fn external_names(&self) -> impl Iterator<Item = &String> {
        self.external.keys()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(|e| e.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolKind;
    use crate::test_support::{index_from_sources, symbol};

    #[test]
    fn test_build_entries_skips_symbols_without_calls() {
        let mut foo = symbol("a.py", "foo", SymbolKind::Function, 1);
        foo.calls = vec!["bar".to_string()];
        let bar = symbol("b.py", "bar", SymbolKind::Function, 1);

        let entries = build_entries([&foo, &bar]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&SymbolKey::new("a.py", "foo")].calls, vec!["bar"]);
    }

    #[test]
    fn test_callers_scenario() {
        let index = index_from_sources(&[("a.py", "def foo():\n    bar()\n"), ("b.py", "def bar():\n    pass\n")]);
        assert_eq!(index.call_graph[&SymbolKey::new("a.py", "foo")].calls, vec!["bar"]);

        let graph = CallGraph::build(&index);
        let callers: Vec<String> = graph
            .callers(&SymbolKey::new("b.py", "bar"))
            .map(|k| k.to_string())
            .collect();
        assert_eq!(callers, vec!["a.py:foo"]);
    }

    #[test]
    fn test_external_calls_excluded_from_callers() {
        let index = index_from_sources(&[("a.py", "import os\n\ndef foo():\n    os.getcwd()\n    foo()\n")]);
        let graph = CallGraph::build(&index);
        let foo = SymbolKey::new("a.py", "foo");

        assert_eq!(graph.external_callers("os.getcwd").count(), 1);
        assert_eq!(graph.callees(&foo), vec![&foo]);
        // self-recursion is an edge but does not count towards in-degree
        assert_eq!(graph.callers(&foo).count(), 1);
        assert_eq!(graph.in_degree(&foo), 0);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_call_graph_snapshot() {
        let index = index_from_sources(&[
            (
                "app/service.py",
                "from app.db import Repo\n\nclass Service:\n    def run(self):\n        self.repo.save()\n        helper()\n\ndef helper():\n    print('x')\n",
            ),
            ("app/db.py", "class Repo:\n    def save(self):\n        pass\n"),
        ]);
        insta::assert_json_snapshot!(index.call_graph, @r###"
        {
          "app/service.py:Service.run": {
            "file": "app/service.py",
            "line": 4,
            "calls": [
              "self.repo.save",
              "helper"
            ]
          },
          "app/service.py:helper": {
            "file": "app/service.py",
            "line": 8,
            "calls": [
              "print"
            ]
          }
        }
        "###);
    }
}
