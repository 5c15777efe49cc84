// Scan driver: discovery, parallel parsing and the single-threaded merge

pub mod incremental;
pub mod parser;
pub mod registry;
pub mod walker;
pub mod watcher;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analysis::{self, AnalysisRules};
use crate::config::{Config, PathFilter};
use crate::error::{IndexError, Result};
use crate::graph;
use crate::index::annotate::{run_annotators, Annotator};
use crate::index::capture::ImportRef;
use crate::index::paths::categorize;
use crate::index::{symbols, Capture, Endpoint, FileRecord, Index, UpdateCounts};

pub use registry::ParserRegistry;

/// One file read, fingerprinted and parsed by a worker.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: String,
    pub language: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub line_count: usize,
    pub capture: Capture,
}

/// What a worker produced for one path. No capture and no warning means the
/// file vanished between discovery and reading.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: String,
    pub parsed: Option<ParsedFile>,
    pub warning: Option<IndexError>,
}

/// Result of a full scan or an incremental update.
#[derive(Debug)]
pub struct ScanReport {
    pub index: Index,
    pub warnings: Vec<IndexError>,
    pub counts: UpdateCounts,
}

/// Read, hash and parse one file. Parser errors and panics degrade the
/// file to an empty capture.
pub fn parse_file(root: &Path, relative: &str, registry: &ParserRegistry) -> FileOutcome {
    let mut outcome = FileOutcome {
        path: relative.to_string(),
        parsed: None,
        warning: None,
    };
    let Some(parser) = registry.for_path(relative) else {
        outcome.warning = Some(IndexError::NoParser(relative.to_string()));
        return outcome;
    };

    let full_path = root.join(relative);
    let bytes = match std::fs::read(&full_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} vanished before it could be read", relative);
            return outcome;
        }
        Err(source) => {
            outcome.warning = Some(IndexError::UnreadableFile {
                path: full_path,
                source,
            });
            return outcome;
        }
    };

    let language = parser.language().to_string();
    let capture = match catch_unwind(AssertUnwindSafe(|| parser.scan(&bytes))) {
        Ok(Ok(capture)) => {
            if capture.is_degraded() {
                outcome.warning = Some(IndexError::ParseDegraded {
                    path: relative.to_string(),
                    reason: "syntax errors".to_string(),
                });
            }
            capture
        }
        Ok(Err(e)) => {
            outcome.warning = Some(IndexError::ParseDegraded {
                path: relative.to_string(),
                reason: format!("{:#}", e),
            });
            Capture::failed(&language)
        }
        Err(_) => {
            outcome.warning = Some(IndexError::ParseDegraded {
                path: relative.to_string(),
                reason: "parser panicked".to_string(),
            });
            Capture::failed(&language)
        }
    };

    outcome.parsed = Some(ParsedFile {
        path: relative.to_string(),
        language,
        content_hash: walker::content_hash(&bytes),
        size_bytes: bytes.len() as u64,
        line_count: walker::line_count(&bytes),
        capture,
    });
    outcome
}

/// Raw import references of a file: each module, plus `module.name` for
/// every name pulled in by a `from` import.
pub fn import_references(imports: &[ImportRef]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    };
    for import in imports {
        for module in import.module.split(',').map(str::trim) {
            push(module.to_string());
            for name in import.names.iter().filter(|n| n.as_str() != "*") {
                if module.ends_with('.') {
                    push(format!("{}{}", module, name));
                } else {
                    push(format!("{}.{}", module, name));
                }
            }
        }
    }
    out
}

/// Fold one parsed file into the index. The caller has already removed any
/// previous records of the same path.
pub fn merge_parsed(index: &mut Index, parsed: ParsedFile) {
    let ParsedFile {
        path,
        language,
        content_hash,
        size_bytes,
        line_count,
        capture,
    } = parsed;

    let file_symbols = symbols::from_capture(&path, &capture);
    index.call_graph.extend(graph::build_entries(&file_symbols));

    for route in &capture.extras.routes {
        index.api_endpoints.push(Endpoint {
            method: route.method.clone(),
            path: route.path.clone(),
            handler: route.handler.clone(),
            file: path.clone(),
            line: route.line,
        });
    }

    index.files.push(FileRecord {
        category: categorize(&path).as_str().to_string(),
        language,
        content_hash,
        size_bytes,
        line_count,
        degraded: capture.is_degraded(),
        imports: import_references(&capture.imports),
        main_calls: capture.main_calls.clone(),
        symbols: file_symbols.iter().map(|s| s.key()).collect(),
        extra: Default::default(),
        path,
    });

    for symbol in file_symbols {
        index.symbols.push(symbol);
    }
}

/// Coordinates a scan over one project root.
pub struct Indexer {
    root: PathBuf,
    config: Config,
    registry: ParserRegistry,
    filter: PathFilter,
    rules: AnalysisRules,
    annotators: Vec<Box<dyn Annotator>>,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
    setup_warnings: Vec<IndexError>,
}

impl Indexer {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let mut setup_warnings = Vec::new();
        let registry = ParserRegistry::from_config(&config, &mut setup_warnings);
        let filter = config.path_filter(&mut setup_warnings);
        let rules = AnalysisRules::from_config(&config.analysis, &mut setup_warnings);
        for w in &setup_warnings {
            warn!("{}", w);
        }

        Self {
            root: root.into(),
            config,
            registry,
            filter,
            rules,
            annotators: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
            setup_warnings,
        }
    }

    pub fn with_annotator(mut self, annotator: Box<dyn Annotator>) -> Self {
        info!(
            "Registered annotator {} ({})",
            annotator.name(),
            annotator.capabilities()
        );
        self.annotators.push(annotator);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Shared flag; setting it stops the current scan between files.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &AnalysisRules {
        &self.rules
    }

    /// Problems found while compiling configured patterns.
    pub fn setup_warnings(&self) -> &[IndexError] {
        &self.setup_warnings
    }

    pub fn index_path(&self) -> PathBuf {
        self.config.index_path(&self.root)
    }

    /// Indexable files on disk, root-relative and sorted.
    pub fn discover(&self, warnings: &mut Vec<IndexError>) -> Vec<String> {
        walker::discover(
            &self.root,
            &self.filter,
            &self.registry,
            self.config.indexing.max_file_size,
            warnings,
        )
    }

    /// Whether a root-relative path would be picked up by a scan.
    pub fn is_indexable(&self, relative: &str) -> bool {
        self.registry.for_path(relative).is_some() && self.filter.allows_file(relative)
    }

    fn progress_bar(&self, len: u64, phase: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(phase.to_string());
        bar
    }

    /// Run `work` over `paths` on a dedicated pool, checking the cancel flag
    /// before each file.
    pub(crate) fn run_parallel<T, F>(&self, paths: &[String], phase: &str, work: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&str) -> T + Sync + Send,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.indexing.threads)
            .thread_name(|i| format!("codeindex-worker-{}", i))
            .build()
            .map_err(|e| IndexError::Config(format!("cannot start worker pool: {}", e)))?;

        let progress = self.progress_bar(paths.len() as u64, phase);
        let cancel = &self.cancel;
        let results: Vec<Option<T>> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    let out = work(path);
                    progress.inc(1);
                    Some(out)
                })
                .collect()
        });
        progress.finish_and_clear();

        if cancel.load(Ordering::Relaxed) {
            info!("{} cancelled", phase);
            return Err(IndexError::Cancelled);
        }
        Ok(results.into_iter().flatten().collect())
    }

    pub(crate) fn parse_all(&self, paths: &[String]) -> Result<Vec<FileOutcome>> {
        self.run_parallel(paths, "Parsing", |path| parse_file(&self.root, path, &self.registry))
    }

    /// Index every file from scratch.
    pub fn full_scan(&self) -> Result<ScanReport> {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let files = self.discover(&mut warnings);
        info!("Indexing {} files under {}", files.len(), self.root.display());

        let outcomes = self.parse_all(&files)?;

        let mut index = Index::new(self.root.display().to_string());
        let mut counts = UpdateCounts::default();
        let mut rebuilt = BTreeSet::new();
        for outcome in outcomes {
            if let Some(warning) = outcome.warning {
                warn!("{}", warning);
                warnings.push(warning);
            }
            if let Some(parsed) = outcome.parsed {
                debug!("Parsed {} ({} symbols)", parsed.path, parsed.capture.symbol_count());
                rebuilt.insert(parsed.path.clone());
                merge_parsed(&mut index, parsed);
                counts.added += 1;
            }
        }

        index.meta.last_update = counts;
        self.finish(&mut index, &rebuilt);

        info!(
            "Indexed {} files, {} symbols, {} call graph entries in {:?}",
            index.files.len(),
            index.symbols.len(),
            index.call_graph.len(),
            start.elapsed()
        );
        Ok(ScanReport {
            index,
            warnings,
            counts,
        })
    }

    /// Annotate rebuilt symbols, recompute analytics and refresh metadata.
    pub(crate) fn finish(&self, index: &mut Index, rebuilt: &BTreeSet<String>) {
        let failures = run_annotators(
            &self.annotators,
            index.symbols.iter_mut().filter(|s| rebuilt.contains(&s.file)),
        );
        if failures > 0 {
            warn!("{} annotations failed", failures);
        }

        index.normalize();
        analysis::recompute(index, &self.rules);
        index.refresh_counts();
        index.touch();
    }
}
