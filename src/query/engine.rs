// Query execution engine

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::coupling::{self, CoupledFile};
use crate::analysis::impact::{self, ImpactReport, TestsReport};
use crate::analysis::AnalysisRules;
use crate::graph::resolver::bare_call_name;
use crate::graph::{CallGraph, Resolution};
use crate::index::{Index, IndexCounts, SymbolKey, SymbolTable};

/// One symbol in a query answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub key: SymbolKey,
    pub qualified_name: String,
    pub kind: String,
    pub file: String,
    pub line: u32,
}

/// Answer to a callers/callees query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolQuery {
    pub target: String,
    /// Indexed symbols the target matched.
    pub matches: Vec<SymbolKey>,
    pub results: Vec<QueryResult>,
    /// Unresolved call names: matched external names for callers, calls
    /// leaving the index for callees.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub generated_at: String,
    pub counts: IndexCounts,
    pub languages: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub degraded_files: Vec<String>,
    pub external_call_names: usize,
    pub core_symbols: usize,
    pub hub_symbols: usize,
    pub flows: usize,
    pub duplicate_groups: usize,
    pub coupled_files: usize,
}

/// Read-only queries over a loaded index. The resolved call graph is built
/// once per engine.
pub struct QueryEngine<'a> {
    index: &'a Index,
    graph: CallGraph,
    rules: &'a AnalysisRules,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a Index, rules: &'a AnalysisRules) -> Self {
        let graph = CallGraph::build(index);
        Self { index, graph, rules }
    }

    pub fn index(&self) -> &Index {
        self.index
    }

    /// Keys a user-supplied target names: `file:qualified`, `Class.method`
    /// or a bare name.
    pub fn resolve_target(&self, target: &str) -> Vec<SymbolKey> {
        SymbolTable::build(&self.index.symbols).lookup(target)
    }

    fn describe(&self, table: &SymbolTable, key: &SymbolKey) -> QueryResult {
        let (kind, line) = table
            .get(key)
            .map(|s| (s.kind.as_str().to_string(), s.line))
            .unwrap_or_else(|| ("unknown".to_string(), 0));
        QueryResult {
            key: key.clone(),
            qualified_name: key.qualified_name.clone(),
            kind,
            file: key.file.clone(),
            line,
        }
    }

    /// Find all callers of a symbol. A target matching no indexed symbol is
    /// looked up among external call names instead.
    pub fn find_callers(&self, target: &str) -> SymbolQuery {
        let table = SymbolTable::build(&self.index.symbols);
        let matches = table.lookup(target);
        let mut callers: BTreeSet<&SymbolKey> = BTreeSet::new();
        let mut external = Vec::new();

        if matches.is_empty() {
            for name in self.graph.external_names() {
                if name == target || bare_call_name(name) == target {
                    external.push(name.clone());
                    callers.extend(self.graph.external_callers(name));
                }
            }
        } else {
            for key in &matches {
                callers.extend(self.graph.callers(key));
            }
        }

        SymbolQuery {
            target: target.to_string(),
            results: callers.into_iter().map(|k| self.describe(&table, k)).collect(),
            matches,
            external,
        }
    }

    /// Find all callees of a symbol, in call order.
    pub fn find_callees(&self, target: &str) -> SymbolQuery {
        let table = SymbolTable::build(&self.index.symbols);
        let matches = table.lookup(target);
        let mut seen = BTreeSet::new();
        let mut results = Vec::new();
        let mut external = Vec::new();

        for key in &matches {
            for edge in self.graph.edges(key) {
                match &edge.target {
                    Resolution::Resolved(callee) => {
                        if seen.insert(callee) {
                            results.push(self.describe(&table, callee));
                        }
                    }
                    Resolution::External(name) => {
                        if !external.contains(name) {
                            external.push(name.clone());
                        }
                    }
                }
            }
        }

        SymbolQuery {
            target: target.to_string(),
            matches,
            results,
            external,
        }
    }

    pub fn tests_for(&self, target: &str) -> Vec<TestsReport> {
        self.resolve_target(target)
            .iter()
            .map(|key| impact::tests_for_symbol(self.index, &self.graph, key, self.rules))
            .collect()
    }

    pub fn impact(&self, file: &str) -> ImpactReport {
        impact::analyze(self.index, &self.graph, file, self.rules)
    }

    pub fn coupled(&self, file: &str, limit: usize) -> Vec<CoupledFile> {
        coupling::coupled_files(self.index, &self.graph, file, limit)
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            generated_at: self.index.meta.generated_at.clone(),
            counts: self.index.meta.counts,
            external_call_names: self.graph.external_names().count(),
            core_symbols: self.index.centrality.counts.core,
            hub_symbols: self.index.centrality.counts.hub,
            flows: self.index.execution_flow.flows.len(),
            duplicate_groups: self.index.potential_duplicates.len(),
            coupled_files: self.index.coupling.files.len(),
            ..Default::default()
        };
        for file in &self.index.files {
            *stats.languages.entry(file.language.clone()).or_default() += 1;
            *stats.categories.entry(file.category.clone()).or_default() += 1;
            if file.degraded {
                stats.degraded_files.push(file.path.clone());
            }
        }
        stats
    }
}
