use crate::config::Config;
use crate::indexer::registry::ParserRegistry;

/// Print the languages the built-in parsers cover.
pub fn list_languages() {
    let mut warnings = Vec::new();
    let registry = ParserRegistry::from_config(&Config::default(), &mut warnings);

    println!("Supported languages:");
    for (language, extensions) in registry.languages() {
        let extensions: Vec<String> = extensions.iter().map(|e| format!(".{}", e)).collect();
        println!("  {:<8} {}", language, extensions.join(", "));
    }
}
