use anyhow::Result;

use super::{load_index, open_project, print_json, OutputFormat};
use crate::query::QueryEngine;

pub async fn show_coupling(file: String, project: String, limit: usize, format: OutputFormat) -> Result<()> {
    let indexer = open_project(&project)?;
    let index = load_index(&indexer)?;
    let file = file.trim_start_matches("./").replace('\\', "/");

    let engine = QueryEngine::new(&index, indexer.rules());
    let partners = engine.coupled(&file, limit);
    if format == OutputFormat::Json {
        return print_json(&partners);
    }

    if partners.is_empty() {
        println!("No files coupled with {}", file);
        return Ok(());
    }
    println!("Files coupled with {}:", file);
    for partner in partners {
        let c = partner.components;
        println!(
            "  {:.3}  {}  (out {:.2}, in {:.2}, import {:.0}, external {:.2}, name {:.2})",
            partner.score,
            partner.file,
            c.calls_out,
            c.calls_in,
            c.direct_import,
            c.shared_external,
            c.name_similarity
        );
    }
    Ok(())
}
