use anyhow::Result;

use super::{load_index, open_project, print_json, OutputFormat};
use crate::query::QueryEngine;

pub async fn show_stats(project: String, verbose: bool, format: OutputFormat) -> Result<()> {
    let indexer = open_project(&project)?;
    let index = load_index(&indexer)?;
    let engine = QueryEngine::new(&index, indexer.rules());
    let stats = engine.stats();

    if format == OutputFormat::Json {
        return print_json(&stats);
    }

    let config = indexer.config();
    println!("codeindex statistics v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", project);
    println!("Config: {}", if config.project.name != "unnamed-project" { "loaded" } else { "default" });
    println!("Generated: {}", stats.generated_at);

    println!("\nIndex:");
    println!("  Files: {}", stats.counts.files);
    println!("  Functions: {}", stats.counts.functions);
    println!("  Classes: {}", stats.counts.classes);
    println!("  Methods: {}", stats.counts.methods);
    println!("  Call graph entries: {}", stats.counts.call_graph_entries);
    println!("  Endpoints: {}", stats.counts.endpoints);

    if let Ok(meta) = std::fs::metadata(indexer.index_path()) {
        println!("  Index size: {:.2} MB", meta.len() as f64 / (1024.0 * 1024.0));
    }

    println!("\nAnalysis:");
    println!("  Core symbols: {}", stats.core_symbols);
    println!("  Hub symbols: {}", stats.hub_symbols);
    println!("  Execution flows: {}", stats.flows);
    println!("  Duplicate groups: {}", stats.duplicate_groups);
    println!("  Files with coupling partners: {}", stats.coupled_files);
    println!("  Distinct external calls: {}", stats.external_call_names);

    if verbose {
        println!("\nLanguages:");
        for (language, count) in &stats.languages {
            println!("  {}: {} files", language, count);
        }
        println!("Categories:");
        for (category, count) in &stats.categories {
            println!("  {}: {} files", category, count);
        }
        if !stats.degraded_files.is_empty() {
            println!("Degraded files ({}):", stats.degraded_files.len());
            for file in &stats.degraded_files {
                println!("  {}", file);
            }
        }
        let centrality = &index.centrality;
        if !centrality.core.is_empty() {
            println!("Top core symbols:");
            for ranked in centrality.core.iter().take(5) {
                println!("  {} (in {}, out {})", ranked.key, ranked.in_degree, ranked.out_degree);
            }
        }
    }

    Ok(())
}
