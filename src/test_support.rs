// Shared fixtures for unit tests

use serde_json::Map;

use crate::analysis::{self, AnalysisRules};
use crate::config::Config;
use crate::index::{Index, Symbol, SymbolKind};
use crate::indexer::{merge_parsed, walker, ParsedFile, ParserRegistry};

/// A bare symbol with no signature, calls or docs.
pub fn symbol(file: &str, qualified: &str, kind: SymbolKind, line: u32) -> Symbol {
    Symbol {
        name: qualified.rsplit('.').next().unwrap_or(qualified).to_string(),
        qualified_name: qualified.to_string(),
        kind,
        file: file.to_string(),
        line,
        end_line: None,
        signature: None,
        docstring: None,
        decorators: Vec::new(),
        bases: Vec::new(),
        calls: Vec::new(),
        body_hash: None,
        extra: Map::new(),
    }
}

/// Index in-memory sources as if they were files under a project root,
/// with analytics computed using the default rules.
pub fn index_from_sources(sources: &[(&str, &str)]) -> Index {
    let registry = ParserRegistry::from_config(&Config::default(), &mut Vec::new());
    let mut index = Index::new(".");
    for (path, source) in sources {
        let parser = registry.for_path(path).expect("registered extension");
        let bytes = source.as_bytes();
        merge_parsed(
            &mut index,
            ParsedFile {
                path: path.to_string(),
                language: parser.language().to_string(),
                content_hash: walker::content_hash(bytes),
                size_bytes: bytes.len() as u64,
                line_count: walker::line_count(bytes),
                capture: parser.scan(bytes).expect("scan"),
            },
        );
    }
    index.normalize();
    analysis::recompute(&mut index, &AnalysisRules::default());
    index.refresh_counts();
    index
}
