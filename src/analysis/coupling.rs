// File coupling scores from calls, imports and naming

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::{round3, AnalysisRules};
use crate::graph::CallGraph;
use crate::index::paths::{dotted_import, file_stem, import_refers_to, module_name};
use crate::index::Index;

pub const TOP_PARTNERS: usize = 5;

const W_CALLS_OUT: f64 = 0.35;
const W_CALLS_IN: f64 = 0.25;
const W_DIRECT_IMPORT: f64 = 0.20;
const W_SHARED_EXTERNAL: f64 = 0.10;
const W_NAME: f64 = 0.10;
/// Call counts saturate here.
const CALL_SATURATION: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouplingComponents {
    pub calls_out: f64,
    pub calls_in: f64,
    pub direct_import: f64,
    pub shared_external: f64,
    pub name_similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoupledFile {
    pub file: String,
    pub score: f64,
    pub components: CouplingComponents,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplingReport {
    #[serde(default)]
    pub files: BTreeMap<String, Vec<CoupledFile>>,
}

/// Per-file facts every pair score is computed from.
pub struct CouplingContext {
    calls: HashMap<(String, String), usize>,
    imports: HashSet<(String, String)>,
    externals: HashMap<String, BTreeSet<String>>,
    tokens: HashMap<String, BTreeSet<String>>,
    files: Vec<String>,
}

impl CouplingContext {
    pub fn build(index: &Index, graph: &CallGraph) -> Self {
        let files: Vec<String> = index.files.iter().map(|f| f.path.clone()).collect();

        let mut calls: HashMap<(String, String), usize> = HashMap::new();
        for caller in index.call_graph.keys() {
            for edge in graph.edges(caller) {
                if let Some(callee) = edge.target.key() {
                    if callee.file != caller.file {
                        *calls
                            .entry((caller.file.clone(), callee.file.clone()))
                            .or_default() += 1;
                    }
                }
            }
        }

        let mut by_last_segment: HashMap<String, Vec<&str>> = HashMap::new();
        let mut local_roots: HashSet<String> = HashSet::new();
        for path in &files {
            let module = module_name(path);
            if let Some(root) = module.split('.').next() {
                local_roots.insert(root.to_string());
            }
            let last = module.rsplit('.').next().unwrap_or(&module).to_string();
            by_last_segment.entry(last).or_default().push(path);
        }

        let mut imports = HashSet::new();
        let mut externals: HashMap<String, BTreeSet<String>> = HashMap::new();
        for record in &index.files {
            for import in &record.imports {
                let dotted = dotted_import(import);
                let trimmed = dotted.trim_start_matches('.');
                let last = trimmed.rsplit('.').next().unwrap_or(trimmed);
                for target in by_last_segment.get(last).into_iter().flatten() {
                    if *target != record.path && import_refers_to(import, target) {
                        imports.insert((record.path.clone(), target.to_string()));
                    }
                }
                if import.starts_with('.') {
                    continue;
                }
                let root = package_root(import);
                let local = root.split(['.', '/']).next().unwrap_or(root);
                if !root.is_empty() && !local_roots.contains(local) {
                    externals
                        .entry(record.path.clone())
                        .or_default()
                        .insert(root.to_string());
                }
            }
        }

        let tokens = files
            .iter()
            .map(|p| (p.clone(), name_tokens(file_stem(p))))
            .collect();

        Self {
            calls,
            imports,
            externals,
            tokens,
            files,
        }
    }

    fn call_count(&self, from: &str, to: &str) -> usize {
        self.calls
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Components of the directed pair `a -> b`.
    pub fn components(&self, a: &str, b: &str) -> CouplingComponents {
        let imported = self.imports.contains(&(a.to_string(), b.to_string()))
            || self.imports.contains(&(b.to_string(), a.to_string()));
        let empty = BTreeSet::new();
        CouplingComponents {
            calls_out: saturate(self.call_count(a, b)),
            calls_in: saturate(self.call_count(b, a)),
            direct_import: if imported { 1.0 } else { 0.0 },
            shared_external: jaccard(
                self.externals.get(a).unwrap_or(&empty),
                self.externals.get(b).unwrap_or(&empty),
            ),
            name_similarity: jaccard(
                self.tokens.get(a).unwrap_or(&empty),
                self.tokens.get(b).unwrap_or(&empty),
            ),
        }
    }

    pub fn score(&self, a: &str, b: &str) -> CoupledFile {
        let c = self.components(a, b);
        let score = W_CALLS_OUT * c.calls_out
            + W_CALLS_IN * c.calls_in
            + W_DIRECT_IMPORT * c.direct_import
            + W_SHARED_EXTERNAL * c.shared_external
            + W_NAME * c.name_similarity;
        CoupledFile {
            file: b.to_string(),
            score: round3(score),
            components: CouplingComponents {
                calls_out: round3(c.calls_out),
                calls_in: round3(c.calls_in),
                direct_import: c.direct_import,
                shared_external: round3(c.shared_external),
                name_similarity: round3(c.name_similarity),
            },
        }
    }

    /// Files sharing at least one non-zero component with `path`.
    fn candidates(&self, path: &str, inverted: &Inverted) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for (a, b) in self.calls.keys().chain(self.imports.iter()) {
            if a == path {
                out.insert(b.clone());
            } else if b == path {
                out.insert(a.clone());
            }
        }
        for package in self.externals.get(path).into_iter().flatten() {
            out.extend(inverted.externals.get(package).into_iter().flatten().cloned());
        }
        for token in self.tokens.get(path).into_iter().flatten() {
            out.extend(inverted.tokens.get(token).into_iter().flatten().cloned());
        }
        out.remove(path);
        out
    }

    fn inverted(&self) -> Inverted {
        let mut inverted = Inverted::default();
        for (file, packages) in &self.externals {
            for p in packages {
                inverted.externals.entry(p.clone()).or_default().push(file.clone());
            }
        }
        for (file, tokens) in &self.tokens {
            for t in tokens {
                inverted.tokens.entry(t.clone()).or_default().push(file.clone());
            }
        }
        inverted
    }
}

#[derive(Default)]
struct Inverted {
    externals: HashMap<String, Vec<String>>,
    tokens: HashMap<String, Vec<String>>,
}

fn saturate(count: usize) -> f64 {
    (count as f64 / CALL_SATURATION).min(1.0)
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Package an absolute import belongs to: `requests.adapters` gives
/// `requests`, `serde::de` gives `serde`, `net/http` gives `net`. A slash
/// path under a host name keeps `host/owner/repo`.
fn package_root(import: &str) -> &str {
    if let Some((head, _)) = import.split_once("::") {
        return head;
    }
    if let Some((head, _)) = import.split_once('/') {
        if !head.contains('.') {
            return head;
        }
        return match import.match_indices('/').nth(2) {
            Some((end, _)) => &import[..end],
            None => import,
        };
    }
    import.split('.').next().unwrap_or(import)
}

/// Lowercased tokens of a file stem, split on `_`, `-`, `.` and camelCase.
pub fn name_tokens(stem: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for part in stem.split(['_', '-', '.']) {
        let mut current = String::new();
        let mut prev_lower = false;
        for ch in part.chars() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.insert(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.push(ch);
        }
        if !current.is_empty() {
            tokens.insert(current.to_lowercase());
        }
    }
    tokens
}

fn rank(list: &mut Vec<CoupledFile>) {
    list.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file.cmp(&b.file))
    });
}

/// Top partners of every file scoring at least `coupling_min_score`.
pub fn compute(index: &Index, graph: &CallGraph, rules: &AnalysisRules) -> CouplingReport {
    let ctx = CouplingContext::build(index, graph);
    let inverted = ctx.inverted();
    let mut report = CouplingReport::default();

    for path in &ctx.files {
        let mut partners: Vec<CoupledFile> = ctx
            .candidates(path, &inverted)
            .iter()
            .map(|other| ctx.score(path, other))
            .filter(|c| c.score >= rules.coupling_min_score)
            .collect();
        if partners.is_empty() {
            continue;
        }
        rank(&mut partners);
        partners.truncate(TOP_PARTNERS);
        report.files.insert(path.clone(), partners);
    }
    report
}

/// On-demand scan of every other file, strongest first.
pub fn coupled_files(index: &Index, graph: &CallGraph, path: &str, limit: usize) -> Vec<CoupledFile> {
    let ctx = CouplingContext::build(index, graph);
    let mut partners: Vec<CoupledFile> = ctx
        .files
        .iter()
        .filter(|other| other.as_str() != path)
        .map(|other| ctx.score(path, other))
        .filter(|c| c.score > 0.0)
        .collect();
    rank(&mut partners);
    partners.truncate(limit);
    partners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::index_from_sources;

    fn sample() -> Index {
        index_from_sources(&[
            (
                "app/orders.py",
                "from app.billing import charge\nimport requests\n\ndef place():\n    charge()\n\ndef refund():\n    charge()\n",
            ),
            ("app/billing.py", "import requests\n\ndef charge():\n    pass\n"),
            ("app/unrelated.py", "def noop():\n    pass\n"),
        ])
    }

    #[test]
    fn test_pair_scores_are_asymmetric() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let ctx = CouplingContext::build(&index, &graph);

        let forward = ctx.score("app/orders.py", "app/billing.py");
        assert_eq!(forward.components.calls_out, 0.4);
        assert_eq!(forward.components.direct_import, 1.0);
        assert_eq!(forward.components.shared_external, 1.0);
        assert_eq!(forward.score, 0.44);

        let backward = ctx.score("app/billing.py", "app/orders.py");
        assert_eq!(backward.components.calls_in, 0.4);
        assert_eq!(backward.score, 0.4);
    }

    #[test]
    fn test_report_keeps_related_files_only() {
        let index = sample();
        let report = &index.coupling;
        assert_eq!(report.files["app/orders.py"][0].file, "app/billing.py");
        assert_eq!(report.files["app/billing.py"][0].file, "app/orders.py");
        assert!(!report.files.contains_key("app/unrelated.py"));
    }

    #[test]
    fn test_coupled_files_on_demand() {
        let index = sample();
        let graph = CallGraph::build(&index);
        let partners = coupled_files(&index, &graph, "app/orders.py", 10);
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].file, "app/billing.py");
        assert!(coupled_files(&index, &graph, "app/orders.py", 0).is_empty());
    }

    #[test]
    fn test_package_roots_follow_import_syntax() {
        assert_eq!(package_root("requests.adapters"), "requests");
        assert_eq!(package_root("serde::de::Visitor"), "serde");
        assert_eq!(package_root("net/http"), "net");
        assert_eq!(package_root("github.com/acme/app/internal/store"), "github.com/acme/app");
        assert_eq!(package_root("gopkg.in/yaml.v3"), "gopkg.in/yaml.v3");
    }

    #[test]
    fn test_externals_for_go_and_rust_imports() {
        let index = index_from_sources(&[
            (
                "cmd/api/main.go",
                "package main\n\nimport (\n    \"net/http\"\n    \"github.com/acme/app/store\"\n    \"github.com/other/lib\"\n)\n\nfunc main() {}\n",
            ),
            (
                "cmd/worker/main.go",
                "package main\n\nimport \"github.com/other/lib\"\n\nfunc main() {}\n",
            ),
            ("src/codec.rs", "use serde::Deserialize;\nuse std::fmt;\n\nfn decode() {}\n"),
        ]);
        let graph = CallGraph::build(&index);
        let ctx = CouplingContext::build(&index, &graph);

        let api: Vec<&str> = ctx.externals["cmd/api/main.go"].iter().map(String::as_str).collect();
        assert_eq!(api, vec!["github.com/acme/app", "github.com/other/lib", "net"]);
        let codec: Vec<&str> = ctx.externals["src/codec.rs"].iter().map(String::as_str).collect();
        assert_eq!(codec, vec!["serde", "std"]);

        let shared = ctx.score("cmd/worker/main.go", "cmd/api/main.go").components.shared_external;
        assert!((shared - 1.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_name_tokens() {
        let tokens: Vec<String> = name_tokens("UserService_v2").into_iter().collect();
        assert_eq!(tokens, vec!["service", "user", "v2"]);
        assert_eq!(name_tokens("user-service"), name_tokens("userService"));
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }
}
