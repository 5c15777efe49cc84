// Graph analytics recomputed over the whole index after every scan

pub mod centrality;
pub mod coupling;
pub mod duplicates;
pub mod flow;
pub mod impact;

use globset::GlobSet;
use std::time::Instant;
use tracing::debug;

use crate::config::{compile_globs, AnalysisConfig};
use crate::error::IndexError;
use crate::graph::CallGraph;
use crate::index::paths::is_test_path;
use crate::index::Index;

/// Compiled analysis settings.
#[derive(Debug, Clone)]
pub struct AnalysisRules {
    pub flow_max_depth: usize,
    pub impact_depth: usize,
    pub entry_prefixes: Vec<String>,
    pub entry_decorators: Vec<String>,
    pub coupling_min_score: f64,
    test_globs: Option<GlobSet>,
}

impl Default for AnalysisRules {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default(), &mut Vec::new())
    }
}

impl AnalysisRules {
    pub fn from_config(config: &AnalysisConfig, warnings: &mut Vec<IndexError>) -> Self {
        Self {
            flow_max_depth: config.flow_max_depth,
            impact_depth: config.impact_depth,
            entry_prefixes: config.entry_prefixes.clone(),
            entry_decorators: config.entry_decorators.clone(),
            coupling_min_score: config.coupling_min_score,
            test_globs: if config.test_patterns.is_empty() {
                None
            } else {
                compile_globs(&config.test_patterns, warnings)
            },
        }
    }

    /// Naming conventions plus any configured test globs.
    pub fn is_test_file(&self, path: &str) -> bool {
        is_test_path(path) || self.test_globs.as_ref().is_some_and(|g| g.is_match(path))
    }
}

/// Rebuild every derived block from scratch. These depend on population
/// statistics, so they are never patched per file.
pub fn recompute(index: &mut Index, rules: &AnalysisRules) {
    let start = Instant::now();
    let graph = CallGraph::build(index);

    index.centrality = centrality::compute(index, &graph);
    index.execution_flow = flow::trace(index, &graph, rules);
    index.coupling = coupling::compute(index, &graph, rules);
    index.potential_duplicates = duplicates::find(&index.symbols);

    debug!(
        "Analytics recomputed in {:?}: {} edges, {} flows, {} coupled files, {} duplicate groups",
        start.elapsed(),
        graph.edge_count(),
        index.execution_flow.flows.len(),
        index.coupling.files.len(),
        index.potential_duplicates.len()
    );
}

/// Round for stable, readable JSON.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
