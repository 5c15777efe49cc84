use anyhow::Result;

use super::{load_index, open_project, print_json, OutputFormat};
use crate::query::QueryEngine;

/// Show what a change to `file` may break.
pub async fn analyze_impact(file: String, project: String, format: OutputFormat) -> Result<()> {
    let indexer = open_project(&project)?;
    let index = load_index(&indexer)?;
    let file = file.trim_start_matches("./").replace('\\', "/");

    if index.file(&file).is_none() {
        eprintln!("Warning: {} is not in the index", file);
    }

    let engine = QueryEngine::new(&index, indexer.rules());
    let report = engine.impact(&file);
    if format == OutputFormat::Json {
        return print_json(&report);
    }

    println!("Impact of changes to {}", report.file);
    println!("  Symbols defined: {}", report.symbols.len());

    println!("\nDirect callers ({}):", report.direct_callers.len());
    for key in &report.direct_callers {
        println!("  {}", key);
    }

    println!("\nTransitive callers ({}):", report.transitive_callers.len());
    for key in &report.transitive_callers {
        println!("  {}", key);
    }

    println!("\nAffected files: {}", report.affected_files().len());

    println!("\nAffected tests ({}):", report.affected_tests.len());
    for test in &report.affected_tests {
        println!("  {}", test);
    }

    if !report.affected_endpoints.is_empty() {
        println!("\nAffected endpoints ({}):", report.affected_endpoints.len());
        for endpoint in &report.affected_endpoints {
            println!(
                "  {} {} -> {}:{}",
                endpoint.method, endpoint.path, endpoint.file, endpoint.handler
            );
        }
    }

    Ok(())
}
