// Execution flow tracing from detected entry points

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::AnalysisRules;
use crate::graph::resolver::bare_call_name;
use crate::graph::CallGraph;
use crate::index::paths::file_stem;
use crate::index::{Index, Symbol, SymbolKey};

pub const MAX_FLOWS: usize = 50;
/// Upper bound on nodes in one flow tree. A node whose callees are cut by
/// the bound is stopped with `MaxDepth`.
pub const MAX_FLOW_NODES: usize = 400;

const ENTRY_NAMES: &[&str] = &["main", "cli", "run", "start", "app", "execute"];

/// Calls never followed: builtins and ubiquitous stdlib helpers that would
/// otherwise bind to same-named project symbols.
const IGNORED_CALLS: &[&str] = &[
    "print", "len", "str", "int", "float", "bool", "list", "dict", "set", "tuple", "range",
    "enumerate", "zip", "map", "filter", "sorted", "reversed", "min", "max", "sum", "any", "all",
    "isinstance", "issubclass", "hasattr", "getattr", "setattr", "super", "type", "repr", "open",
    "format", "iter", "next", "id", "hash", "abs", "round", "append", "extend", "insert", "pop",
    "get", "items", "keys", "values", "update", "join", "split", "strip", "replace", "startswith",
    "endswith", "lower", "upper", "encode", "decode", "debug", "info", "warning", "error",
    "exception", "unwrap", "expect", "clone", "to_string", "into", "collect", "iter_mut",
    "println", "Println", "Printf", "Sprintf", "Errorf", "toString", "equals", "hashCode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    Cycle,
    MaxDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryReason {
    Name,
    Prefix,
    MainModule,
    MainGuard,
    Decorator,
    Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNode {
    pub key: SymbolKey,
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FlowNode>,
}

impl FlowNode {
    /// Descendants, the node itself excluded.
    pub fn descendant_count(&self) -> usize {
        self.children.iter().map(|c| 1 + c.descendant_count()).sum()
    }

    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.max_depth())
            .max()
            .unwrap_or(self.depth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub entry: SymbolKey,
    pub reason: EntryReason,
    pub total_calls: usize,
    pub max_depth_reached: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    pub tree: FlowNode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowReport {
    pub max_depth: usize,
    pub entry_points: usize,
    #[serde(default)]
    pub flows: Vec<Flow>,
}

/// Why `symbol` starts a flow, if it does.
pub fn entry_reason(symbol: &Symbol, index: &Index, rules: &AnalysisRules) -> Option<EntryReason> {
    if !symbol.kind.is_callable() {
        return None;
    }
    let name = symbol.name.as_str();
    let is_top_level = symbol.name == symbol.qualified_name;

    if ENTRY_NAMES.contains(&name) {
        return Some(EntryReason::Name);
    }
    if name.starts_with("main") || rules.entry_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
        return Some(EntryReason::Prefix);
    }
    if file_stem(&symbol.file) == "__main__" {
        return Some(EntryReason::MainModule);
    }
    if is_top_level
        && index
            .file(&symbol.file)
            .is_some_and(|f| f.main_calls.iter().any(|c| c == name))
    {
        return Some(EntryReason::MainGuard);
    }
    if symbol
        .decorators
        .iter()
        .any(|d| matches_entry_decorator(d, &rules.entry_decorators))
    {
        return Some(EntryReason::Decorator);
    }
    if index
        .api_endpoints
        .iter()
        .any(|e| e.file == symbol.file && e.handler == symbol.qualified_name)
    {
        return Some(EntryReason::Endpoint);
    }
    None
}

/// `@click.command(name="x")` matches marker `click.command`; a bare marker
/// like `command` matches any dotted receiver.
pub fn matches_entry_decorator(decorator: &str, markers: &[String]) -> bool {
    let callee = decorator
        .trim_start_matches('@')
        .split('(')
        .next()
        .unwrap_or("")
        .trim();
    markers
        .iter()
        .any(|m| callee == m || callee.ends_with(&format!(".{}", m)))
}

fn is_ignored(raw: &str) -> bool {
    IGNORED_CALLS.contains(&bare_call_name(raw))
}

struct Tracer<'a> {
    graph: &'a CallGraph,
    max_depth: usize,
    budget: usize,
    truncated: bool,
}

impl Tracer<'_> {
    fn visit(&mut self, key: &SymbolKey, depth: usize, path: &mut Vec<SymbolKey>) -> FlowNode {
        let mut node = FlowNode {
            key: key.clone(),
            depth,
            stop: None,
            children: Vec::new(),
        };

        let mut seen = HashSet::new();
        let callees: Vec<&SymbolKey> = self
            .graph
            .edges(key)
            .iter()
            .filter(|e| !is_ignored(&e.raw))
            .filter_map(|e| e.target.key())
            .filter(|k| seen.insert(*k))
            .collect();
        if callees.is_empty() {
            return node;
        }
        if depth >= self.max_depth {
            node.stop = Some(StopReason::MaxDepth);
            return node;
        }

        path.push(key.clone());
        for callee in callees {
            if self.budget == 0 {
                // Callees left unvisited: the path ends here like a depth stop
                self.truncated = true;
                node.stop = Some(StopReason::MaxDepth);
                break;
            }
            self.budget -= 1;
            if path.contains(callee) {
                node.children.push(FlowNode {
                    key: callee.clone(),
                    depth: depth + 1,
                    stop: Some(StopReason::Cycle),
                    children: Vec::new(),
                });
            } else {
                let child = self.visit(callee, depth + 1, path);
                node.children.push(child);
            }
        }
        path.pop();
        node
    }
}

/// Trace one flow from `entry` with DFS bounded by `max_depth`.
pub fn trace_from(graph: &CallGraph, entry: &SymbolKey, reason: EntryReason, max_depth: usize) -> Flow {
    let mut tracer = Tracer {
        graph,
        max_depth,
        budget: MAX_FLOW_NODES,
        truncated: false,
    };
    let tree = tracer.visit(entry, 0, &mut Vec::new());
    Flow {
        entry: entry.clone(),
        reason,
        total_calls: tree.descendant_count(),
        max_depth_reached: tree.max_depth(),
        truncated: tracer.truncated,
        tree,
    }
}

pub fn trace(index: &Index, graph: &CallGraph, rules: &AnalysisRules) -> FlowReport {
    let entries: BTreeMap<SymbolKey, EntryReason> = index
        .symbols
        .iter()
        .filter_map(|s| entry_reason(s, index, rules).map(|r| (s.key(), r)))
        .collect();

    let mut flows: Vec<Flow> = entries
        .iter()
        .map(|(key, reason)| trace_from(graph, key, *reason, rules.flow_max_depth))
        .filter(|f| f.total_calls > 0)
        .collect();
    flows.sort_by(|a, b| b.total_calls.cmp(&a.total_calls).then_with(|| a.entry.cmp(&b.entry)));
    flows.truncate(MAX_FLOWS);

    FlowReport {
        max_depth: rules.flow_max_depth,
        entry_points: entries.len(),
        flows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::index_from_sources;
    use proptest::prelude::*;

    fn flow_for<'a>(report: &'a FlowReport, key: &str) -> Option<&'a Flow> {
        report.flows.iter().find(|f| f.entry.to_string() == key)
    }

    #[test]
    fn test_entry_by_name_and_depth() {
        let index = index_from_sources(&[(
            "cli.py",
            "def main():\n    load()\n    print('done')\n\ndef load():\n    parse()\n\ndef parse():\n    pass\n",
        )]);
        let report = &index.execution_flow;
        let flow = flow_for(report, "cli.py:main").expect("main flow");
        assert_eq!(flow.reason, EntryReason::Name);
        assert_eq!(flow.total_calls, 2);
        assert_eq!(flow.max_depth_reached, 2);
        assert_eq!(flow.tree.children[0].key, SymbolKey::new("cli.py", "load"));
        // parse has no calls and is not an entry point anyway
        assert!(flow_for(report, "cli.py:parse").is_none());
    }

    #[test]
    fn test_cycle_is_tagged() {
        let index = index_from_sources(&[(
            "a.py",
            "def run():\n    ping()\n\ndef ping():\n    pong()\n\ndef pong():\n    ping()\n",
        )]);
        let flow = flow_for(&index.execution_flow, "a.py:run").expect("run flow");
        let ping = &flow.tree.children[0];
        let pong = &ping.children[0];
        assert_eq!(pong.children[0].key, SymbolKey::new("a.py", "ping"));
        assert_eq!(pong.children[0].stop, Some(StopReason::Cycle));
    }

    #[test]
    fn test_max_depth_stop() {
        let index = index_from_sources(&[(
            "a.py",
            "def main():\n    a()\n\ndef a():\n    b()\n\ndef b():\n    c()\n\ndef c():\n    pass\n",
        )]);
        let graph = CallGraph::build(&index);
        let flow = trace_from(&graph, &SymbolKey::new("a.py", "main"), EntryReason::Name, 1);
        assert_eq!(flow.total_calls, 1);
        assert_eq!(flow.tree.children[0].stop, Some(StopReason::MaxDepth));
    }

    /// Every node either lists all its followed callees or says why not.
    fn assert_cut_nodes_have_reason(graph: &CallGraph, node: &FlowNode) {
        if node.stop.is_none() {
            let callees: HashSet<&SymbolKey> = graph
                .edges(&node.key)
                .iter()
                .filter(|e| !is_ignored(&e.raw))
                .filter_map(|e| e.target.key())
                .collect();
            assert_eq!(node.children.len(), callees.len(), "{} cut without a stop", node.key);
        }
        for child in &node.children {
            assert_cut_nodes_have_reason(graph, child);
        }
    }

    #[test]
    fn test_node_budget_stops_are_tagged() {
        let mut source = String::from("def main():\n");
        for i in 0..30 {
            source.push_str(&format!("    f{}()\n", i));
        }
        for i in 0..30 {
            source.push_str(&format!("\ndef f{}():\n", i));
            for j in 0..20 {
                source.push_str(&format!("    g{}_{}()\n", i, j));
            }
        }
        for i in 0..30 {
            for j in 0..20 {
                source.push_str(&format!("\ndef g{}_{}():\n    pass\n", i, j));
            }
        }
        let index = index_from_sources(&[("app.py", source.as_str())]);
        let graph = CallGraph::build(&index);
        let flow = trace_from(&graph, &SymbolKey::new("app.py", "main"), EntryReason::Name, 6);

        assert!(flow.truncated);
        assert_eq!(flow.total_calls, MAX_FLOW_NODES);
        assert_eq!(flow.tree.stop, Some(StopReason::MaxDepth));
        assert_eq!(flow.tree.children.len(), 20);
        let f19 = &flow.tree.children[19];
        assert_eq!(f19.key, SymbolKey::new("app.py", "f19"));
        assert!(f19.children.is_empty());
        assert_eq!(f19.stop, Some(StopReason::MaxDepth));
        assert_cut_nodes_have_reason(&graph, &flow.tree);
    }

    #[test]
    fn test_main_guard_and_decorator_entries() {
        let index = index_from_sources(&[
            (
                "tool.py",
                "import click\n\n@click.command()\ndef sync():\n    fetch()\n\ndef fetch():\n    pass\n\ndef go():\n    fetch()\n\nif __name__ == '__main__':\n    go()\n",
            ),
        ]);
        let report = &index.execution_flow;
        assert_eq!(flow_for(report, "tool.py:sync").map(|f| f.reason), Some(EntryReason::Decorator));
        assert_eq!(flow_for(report, "tool.py:go").map(|f| f.reason), Some(EntryReason::MainGuard));
    }

    #[test]
    fn test_endpoint_handler_is_entry() {
        let index = index_from_sources(&[(
            "api.py",
            "@app.get('/users')\ndef list_users():\n    query()\n\ndef query():\n    pass\n",
        )]);
        let flow = flow_for(&index.execution_flow, "api.py:list_users").expect("endpoint flow");
        assert_eq!(flow.reason, EntryReason::Endpoint);
    }

    #[test]
    fn test_matches_entry_decorator() {
        let markers = vec!["click.command".to_string(), "shared_task".to_string()];
        assert!(matches_entry_decorator("@click.command(name='x')", &markers));
        assert!(matches_entry_decorator("celery.shared_task", &markers));
        assert!(!matches_entry_decorator("functools.wraps(f)", &markers));
    }

    proptest! {
        #[test]
        fn prop_flow_depth_is_bounded(
            edges in prop::collection::vec((0usize..12, 0usize..12), 0..40),
            max_depth in 1usize..6,
        ) {
            let mut bodies: Vec<Vec<String>> = vec![Vec::new(); 12];
            for (from, to) in edges {
                let call = format!("    f{}()", to);
                if !bodies[from].contains(&call) {
                    bodies[from].push(call);
                }
            }
            let mut source = String::new();
            for (i, body) in bodies.iter().enumerate() {
                source.push_str(&format!("def f{}():\n", i));
                if body.is_empty() {
                    source.push_str("    pass\n");
                } else {
                    for line in body {
                        source.push_str(line);
                        source.push('\n');
                    }
                }
                source.push('\n');
            }
            let index = index_from_sources(&[("g.py", source.as_str())]);
            let graph = CallGraph::build(&index);
            let flow = trace_from(&graph, &SymbolKey::new("g.py", "f0"), EntryReason::Name, max_depth);
            prop_assert!(flow.max_depth_reached <= max_depth);
            prop_assert!(flow.total_calls <= MAX_FLOW_NODES);
        }
    }
}
