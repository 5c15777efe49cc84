// Blast radius of a change to one file

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::AnalysisRules;
use crate::graph::CallGraph;
use crate::index::paths::import_refers_to;
use crate::index::{Endpoint, Index, SymbolKey};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub file: String,
    pub symbols: Vec<SymbolKey>,
    /// Callers in other files.
    pub direct_callers: Vec<SymbolKey>,
    /// Callers reached by further reverse hops, direct callers excluded.
    pub transitive_callers: Vec<SymbolKey>,
    pub affected_tests: Vec<String>,
    pub affected_endpoints: Vec<Endpoint>,
}

impl ImpactReport {
    pub fn affected_files(&self) -> BTreeSet<&str> {
        self.direct_callers
            .iter()
            .chain(self.transitive_callers.iter())
            .map(|k| k.file.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestsReport {
    pub symbol: Option<SymbolKey>,
    pub test_symbols: Vec<SymbolKey>,
    pub test_files: Vec<String>,
}

/// Impact of changing `path`. Pure: the same index always yields the same
/// report.
pub fn analyze(index: &Index, graph: &CallGraph, path: &str, rules: &AnalysisRules) -> ImpactReport {
    let symbols: Vec<SymbolKey> = index.symbols_in_file(path).map(|s| s.key()).collect();
    let owned: BTreeSet<&SymbolKey> = symbols.iter().collect();

    let direct: BTreeSet<SymbolKey> = symbols
        .iter()
        .flat_map(|k| graph.callers(k))
        .filter(|caller| caller.file != path)
        .cloned()
        .collect();

    let mut seen: BTreeSet<SymbolKey> = direct.clone();
    let mut transitive: BTreeSet<SymbolKey> = BTreeSet::new();
    let mut frontier: Vec<SymbolKey> = direct.iter().cloned().collect();
    for _ in 0..rules.impact_depth {
        let mut next = Vec::new();
        for key in &frontier {
            for caller in graph.callers(key) {
                if owned.contains(caller) || !seen.insert(caller.clone()) {
                    continue;
                }
                transitive.insert(caller.clone());
                next.push(caller.clone());
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let mut tests: BTreeSet<String> = direct
        .iter()
        .chain(transitive.iter())
        .filter(|k| rules.is_test_file(&k.file))
        .map(|k| k.file.clone())
        .collect();
    for file in &index.files {
        if file.path != path
            && rules.is_test_file(&file.path)
            && file.imports.iter().any(|i| import_refers_to(i, path))
        {
            tests.insert(file.path.clone());
        }
    }

    let handlers: BTreeSet<(&str, &str)> = direct
        .iter()
        .chain(transitive.iter())
        .map(|k| (k.file.as_str(), k.qualified_name.as_str()))
        .collect();
    let affected_endpoints = index
        .api_endpoints
        .iter()
        .filter(|e| e.file == path || handlers.contains(&(e.file.as_str(), e.handler.as_str())))
        .cloned()
        .collect();

    ImpactReport {
        file: path.to_string(),
        symbols,
        direct_callers: direct.into_iter().collect(),
        transitive_callers: transitive.into_iter().collect(),
        affected_tests: tests.into_iter().collect(),
        affected_endpoints,
    }
}

/// Tests exercising `key`: test-file callers within `depth` reverse hops,
/// plus test files importing its module.
pub fn tests_for_symbol(index: &Index, graph: &CallGraph, key: &SymbolKey, rules: &AnalysisRules) -> TestsReport {
    let mut seen: BTreeSet<&SymbolKey> = BTreeSet::from([key]);
    let mut frontier = vec![key];
    let mut test_symbols = BTreeSet::new();

    for _ in 0..=rules.impact_depth {
        let mut next = Vec::new();
        for current in frontier {
            for caller in graph.callers(current) {
                if !seen.insert(caller) {
                    continue;
                }
                if rules.is_test_file(&caller.file) {
                    test_symbols.insert(caller.clone());
                }
                next.push(caller);
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let mut test_files: BTreeSet<String> = test_symbols.iter().map(|k| k.file.clone()).collect();
    for file in &index.files {
        if rules.is_test_file(&file.path) && file.imports.iter().any(|i| import_refers_to(i, &key.file)) {
            test_files.insert(file.path.clone());
        }
    }

    TestsReport {
        symbol: Some(key.clone()),
        test_symbols: test_symbols.into_iter().collect(),
        test_files: test_files.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::index_from_sources;

    fn sample() -> Index {
        index_from_sources(&[
            ("app/db.py", "def save():\n    pass\n"),
            ("app/service.py", "def store():\n    save()\n"),
            ("app/api.py", "@app.post('/items')\ndef create():\n    store()\n"),
            ("app/cli.py", "def main():\n    create()\n"),
            ("tests/test_service.py", "def test_store():\n    store()\n"),
            ("tests/test_db.py", "from app.db import save\n\ndef test_nothing():\n    pass\n"),
        ])
    }

    #[test]
    fn test_impact_layers() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let report = analyze(&index, &graph, "app/db.py", &AnalysisRules::default());

        assert_eq!(report.symbols, vec![SymbolKey::new("app/db.py", "save")]);
        assert_eq!(report.direct_callers, vec![SymbolKey::new("app/service.py", "store")]);
        assert_eq!(
            report.transitive_callers,
            vec![
                SymbolKey::new("app/api.py", "create"),
                SymbolKey::new("app/cli.py", "main"),
                SymbolKey::new("tests/test_service.py", "test_store"),
            ]
        );
        assert_eq!(report.affected_tests, vec!["tests/test_db.py", "tests/test_service.py"]);
        assert_eq!(report.affected_endpoints.len(), 1);
        assert_eq!(report.affected_endpoints[0].handler, "create");
    }

    #[test]
    fn test_impact_depth_limits_hops() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let mut rules = AnalysisRules::default();
        rules.impact_depth = 0;
        let report = analyze(&index, &graph, "app/db.py", &rules);
        assert!(report.transitive_callers.is_empty());
        assert_eq!(report.affected_tests, vec!["tests/test_db.py"]);
        assert!(report.affected_endpoints.is_empty());
    }

    #[test]
    fn test_impact_is_idempotent() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let rules = AnalysisRules::default();
        assert_eq!(
            analyze(&index, &graph, "app/service.py", &rules),
            analyze(&index, &graph, "app/service.py", &rules)
        );
    }

    #[test]
    fn test_unknown_file_is_empty() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let report = analyze(&index, &graph, "nope.py", &AnalysisRules::default());
        assert!(report.symbols.is_empty() && report.direct_callers.is_empty());
    }

    #[test]
    fn test_tests_for_symbol() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let report = tests_for_symbol(
            &index,
            &graph,
            &SymbolKey::new("app/db.py", "save"),
            &AnalysisRules::default(),
        );
        assert_eq!(report.test_symbols, vec![SymbolKey::new("tests/test_service.py", "test_store")]);
        assert_eq!(report.test_files, vec!["tests/test_db.py", "tests/test_service.py"]);
    }
}
