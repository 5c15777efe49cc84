use anyhow::Result;
use clap::ValueEnum;

use super::{load_index, open_project, print_json, OutputFormat};
use crate::query::{QueryEngine, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryType {
    Callers,
    Callees,
    Tests,
}

pub async fn query_index(query_type: QueryType, target: String, project: String, format: OutputFormat) -> Result<()> {
    let indexer = open_project(&project)?;
    let index = load_index(&indexer)?;
    let engine = QueryEngine::new(&index, indexer.rules());

    match query_type {
        QueryType::Callers | QueryType::Callees => {
            let (label, answer) = if query_type == QueryType::Callers {
                ("callers", engine.find_callers(&target))
            } else {
                ("callees", engine.find_callees(&target))
            };
            if format == OutputFormat::Json {
                return print_json(&answer);
            }
            if answer.matches.is_empty() && answer.external.is_empty() {
                println!("No symbol matches '{}'", target);
                return Ok(());
            }
            if answer.matches.len() > 1 {
                println!("'{}' matches {} symbols:", target, answer.matches.len());
                for key in &answer.matches {
                    println!("  {}", key);
                }
            }
            if answer.results.is_empty() {
                println!("No {} found for '{}'", label, target);
            } else {
                println!("Found {} {} of '{}':", answer.results.len(), label, target);
                print_results(&answer.results);
            }
            if !answer.external.is_empty() {
                println!("External: {}", answer.external.join(", "));
            }
        }
        QueryType::Tests => {
            let reports = engine.tests_for(&target);
            if format == OutputFormat::Json {
                return print_json(&reports);
            }
            if reports.is_empty() {
                println!("No symbol matches '{}'", target);
            }
            for report in reports {
                let key = report.symbol.map(|k| k.to_string()).unwrap_or_default();
                if report.test_files.is_empty() {
                    println!("{}: no tests found", key);
                    continue;
                }
                println!("{}:", key);
                for file in &report.test_files {
                    println!("  {}", file);
                }
                for symbol in &report.test_symbols {
                    println!("    calls via {}", symbol);
                }
            }
        }
    }

    Ok(())
}

fn print_results(results: &[QueryResult]) {
    for result in results {
        println!(
            "  {}:{} - {} ({})",
            result.file, result.line, result.qualified_name, result.kind
        );
    }
}
