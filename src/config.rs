// Configuration management for codeindex

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

pub const CONFIG_FILE: &str = ".codeindex.toml";
pub const DEFAULT_INDEX_FILE: &str = ".codeindex.json";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub languages: LanguagesConfig,
    pub indexing: IndexingConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Glob patterns (relative to the project root) never indexed.
    pub exclude: Vec<String>,
    /// When non-empty, only files matching one of these globs are indexed.
    pub include: Vec<String>,
    pub watch: bool,
    pub max_file_size: u64,
    /// Parser worker threads, 0 for one per core.
    pub threads: usize,
    pub index_path: String,
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub flow_max_depth: usize,
    pub impact_depth: usize,
    /// Name prefixes that mark additional entry points.
    pub entry_prefixes: Vec<String>,
    /// Decorators (dotted, suffix matched) that mark entry points.
    pub entry_decorators: Vec<String>,
    /// Regexes over a decorator's callee that mark HTTP routes. The first
    /// capture group, when present, is the HTTP method.
    pub route_patterns: Vec<String>,
    /// Extra globs marking test files, on top of the naming conventions.
    pub test_patterns: Vec<String>,
    pub coupling_min_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub transport: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
        }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            enabled: SUPPORTED_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/__pycache__/**".to_string(),
                "**/.venv/**".to_string(),
                "**/venv/**".to_string(),
                "**/.tox/**".to_string(),
                "**/.mypy_cache/**".to_string(),
                "**/.pytest_cache/**".to_string(),
                "**/build/**".to_string(),
                "**/dist/**".to_string(),
                "**/*.egg-info/**".to_string(),
            ],
            include: vec![],
            watch: false,
            max_file_size: 2 * 1024 * 1024,
            threads: 0,
            index_path: DEFAULT_INDEX_FILE.to_string(),
            debounce_ms: 500,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            flow_max_depth: 6,
            impact_depth: 2,
            entry_prefixes: vec!["setup_".to_string()],
            entry_decorators: vec![
                "click.command".to_string(),
                "click.group".to_string(),
                "cli.command".to_string(),
                "app.command".to_string(),
                "typer.command".to_string(),
                "shared_task".to_string(),
                "app.task".to_string(),
                "celery.task".to_string(),
                "app.on_event".to_string(),
            ],
            route_patterns: vec![
                r"^(?:\w+\.)*(?:app|router|api|bp|blueprint)\.(get|post|put|patch|delete|head|options|route|websocket)$".to_string(),
            ],
            test_patterns: vec![],
            coupling_min_score: 0.1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".to_string(),
        }
    }
}

pub const SUPPORTED_LANGUAGES: &[&str] = &["python", "rust", "go", "java"];

/// Compiled include/exclude globs.
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude: GlobSet,
    include: Option<GlobSet>,
}

impl PathFilter {
    /// Whether a root-relative file path may be indexed.
    pub fn allows_file(&self, relative: &str) -> bool {
        if self.exclude.is_match(relative) {
            return false;
        }
        match &self.include {
            Some(include) => include.is_match(relative),
            None => true,
        }
    }

    /// Whether a directory should be descended into.
    pub fn allows_dir(&self, relative: &str) -> bool {
        relative.is_empty() || !self.exclude.is_match(format!("{}/", relative))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| IndexError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from project directory
    /// Looks for .codeindex.toml in the project root
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);

        if !config_path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, project_dir.as_ref().display());
            return Self::default();
        }

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Compile include/exclude globs. Malformed patterns are skipped and
    /// reported as warnings.
    pub fn path_filter(&self, warnings: &mut Vec<IndexError>) -> PathFilter {
        let exclude = compile_globs(&self.indexing.exclude, warnings)
            .unwrap_or_else(GlobSet::empty);
        let include = if self.indexing.include.is_empty() {
            None
        } else {
            compile_globs(&self.indexing.include, warnings)
        };
        PathFilter { exclude, include }
    }

    /// Where the index document lives for a project root.
    pub fn index_path(&self, root: &Path) -> PathBuf {
        let configured = Path::new(&self.indexing.index_path);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            root.join(configured)
        }
    }

    /// Get enabled languages, filtered by what's actually supported
    pub fn get_enabled_languages(&self) -> Vec<String> {
        self.languages
            .enabled
            .iter()
            .filter(|lang| SUPPORTED_LANGUAGES.contains(&lang.as_str()))
            .cloned()
            .collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.project.name.is_empty() {
            return Err(IndexError::Config("Project name cannot be empty".to_string()));
        }

        for lang in &self.languages.enabled {
            if !SUPPORTED_LANGUAGES.contains(&lang.as_str()) {
                return Err(IndexError::Config(format!("Unsupported language: {}", lang)));
            }
        }

        if self.indexing.max_file_size == 0 {
            return Err(IndexError::Config("max_file_size must be greater than 0".to_string()));
        }
        if self.indexing.index_path.is_empty() {
            return Err(IndexError::Config("index_path cannot be empty".to_string()));
        }

        if self.analysis.flow_max_depth == 0 {
            return Err(IndexError::Config("flow_max_depth must be greater than 0".to_string()));
        }
        if self.analysis.impact_depth == 0 {
            return Err(IndexError::Config("impact_depth must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.analysis.coupling_min_score) {
            return Err(IndexError::Config("coupling_min_score must be within [0, 1]".to_string()));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(IndexError::Config(format!("Invalid log level: {}", self.logging.level)));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(IndexError::Config(format!("Invalid log format: {}", self.logging.format)));
        }

        if self.mcp.transport != "stdio" {
            return Err(IndexError::Config(format!("Invalid MCP transport: {}", self.mcp.transport)));
        }

        Ok(())
    }
}

pub(crate) fn compile_globs(patterns: &[String], warnings: &mut Vec<IndexError>) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = 0;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                added += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping invalid glob '{}': {}", pattern, e);
                warnings.push(IndexError::ConfigInvalid {
                    rule: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    if added == 0 {
        return None;
    }
    match builder.build() {
        Ok(set) => Some(set),
        Err(e) => {
            warnings.push(IndexError::ConfigInvalid {
                rule: patterns.join(","),
                reason: e.to_string(),
            });
            None
        }
    }
}
