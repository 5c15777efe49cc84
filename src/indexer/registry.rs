// Extension -> parser lookup, fixed once configuration is known

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::parser::{GoParser, JavaParser, LanguageParser, PythonParser, RustParser};
use crate::config::Config;
use crate::error::IndexError;

/// Immutable registry shared read-only by every scan worker.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    by_extension: HashMap<String, Arc<dyn LanguageParser>>,
}

impl ParserRegistry {
    /// Registry with the bundled parsers for the enabled languages.
    /// Malformed detection rules become `ConfigInvalid` warnings.
    pub fn from_config(config: &Config, warnings: &mut Vec<IndexError>) -> Self {
        let mut registry = Self::default();
        for language in config.get_enabled_languages() {
            let parser: Arc<dyn LanguageParser> = match language.as_str() {
                "python" => Arc::new(PythonParser::with_route_patterns(
                    &config.analysis.route_patterns,
                    warnings,
                )),
                "rust" => Arc::new(RustParser::new()),
                "go" => Arc::new(GoParser::new()),
                "java" => Arc::new(JavaParser::new()),
                other => {
                    tracing::warn!("No bundled parser for language: {}", other);
                    continue;
                }
            };
            registry.register(parser);
        }
        registry
    }

    /// Add a parser for every extension it declares. Later registrations
    /// replace earlier ones for the same extension.
    pub fn register(&mut self, parser: Arc<dyn LanguageParser>) {
        for ext in parser.extensions() {
            self.by_extension.insert(ext.to_lowercase(), Arc::clone(&parser));
        }
    }

    pub fn for_extension(&self, ext: &str) -> Option<&Arc<dyn LanguageParser>> {
        self.by_extension.get(&ext.trim_start_matches('.').to_lowercase())
    }

    pub fn for_path(&self, path: &str) -> Option<&Arc<dyn LanguageParser>> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        self.for_extension(ext)
    }

    pub fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.for_extension(e).is_some())
            .unwrap_or(false)
    }

    /// Language name -> registered extensions, sorted.
    pub fn languages(&self) -> BTreeMap<String, Vec<String>> {
        let mut languages: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (ext, parser) in &self.by_extension {
            languages
                .entry(parser.language().to_string())
                .or_default()
                .push(ext.clone());
        }
        for exts in languages.values_mut() {
            exts.sort();
        }
        languages
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.languages()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = ParserRegistry::from_config(&Config::default(), &mut Vec::new());
        assert_eq!(registry.for_path("pkg/app.py").map(|p| p.language()), Some("python"));
        assert_eq!(registry.for_path("src/Main.JAVA").map(|p| p.language()), Some("java"));
        assert_eq!(registry.for_extension(".rs").map(|p| p.language()), Some("rust"));
        assert!(registry.for_path("README.md").is_none());
        assert!(registry.for_path("Makefile").is_none());
        assert!(registry.supports(Path::new("main.go")));

        let languages = registry.languages();
        assert_eq!(languages["python"], vec!["py", "pyi"]);
    }

    #[test]
    fn test_enabled_languages_only() {
        let mut config = Config::default();
        config.languages.enabled = vec!["python".to_string()];
        let registry = ParserRegistry::from_config(&config, &mut Vec::new());
        assert!(registry.for_path("main.go").is_none());
        assert_eq!(registry.languages().len(), 1);
    }

    #[test]
    fn test_invalid_route_rule_reported() {
        let mut config = Config::default();
        config.analysis.route_patterns = vec!["(unclosed".to_string()];
        let mut warnings = Vec::new();
        let registry = ParserRegistry::from_config(&config, &mut warnings);
        assert!(!registry.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].is_warning());
    }
}
