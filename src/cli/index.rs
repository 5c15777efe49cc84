use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::open_project;
use crate::index::store;
use crate::indexer::watcher::start_watcher;

/// Build or refresh the index of `project`.
///
/// An existing index is updated incrementally unless `rebuild` is set;
/// `update` insists on an existing index.
pub async fn index_project(project: String, update: bool, rebuild: bool, watch: bool, quiet: bool) -> Result<()> {
    let indexer = open_project(&project)?.with_progress(!quiet);
    let index_path = indexer.index_path();
    let should_watch = watch || indexer.config().indexing.watch;

    let prior = if rebuild {
        None
    } else {
        store::load_if_exists(&index_path)
            .with_context(|| format!("Failed to load index from {}", index_path.display()))?
    };
    if update && prior.is_none() && !rebuild {
        anyhow::bail!(
            "No index at {} to update. Run 'codeindex index --project {}' first.",
            index_path.display(),
            project
        );
    }

    let indexer = Arc::new(indexer);
    let worker = Arc::clone(&indexer);
    let report = tokio::task::spawn_blocking(move || match prior {
        Some(prior) => {
            info!("Updating existing index");
            worker.update(prior)
        }
        None => worker.full_scan(),
    })
    .await
    .context("Indexing task panicked")??;

    store::save(&report.index, &index_path)
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;

    if !quiet {
        let counts = &report.index.meta.counts;
        println!("Index: {}", index_path.display());
        println!(
            "Files: {} ({} added, {} updated, {} deleted, {} unchanged)",
            counts.files, report.counts.added, report.counts.updated, report.counts.deleted, report.counts.unchanged
        );
        println!(
            "Symbols: {} functions, {} classes, {} methods",
            counts.functions, counts.classes, counts.methods
        );
        println!("Call graph entries: {}", counts.call_graph_entries);
        println!("Endpoints: {}", counts.endpoints);
        if !report.warnings.is_empty() {
            println!("Warnings: {}", report.warnings.len());
            for warning in report.warnings.iter().take(20) {
                println!("  - {}", warning);
            }
        }
    }

    if should_watch {
        if !quiet {
            println!("\nWatching for changes. Press Ctrl+C to stop.");
        }
        start_watcher(indexer, report.index).await?;
    }

    Ok(())
}
