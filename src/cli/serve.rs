use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::open_project;
use crate::index::store;
use crate::indexer::watcher::FileWatcher;
use crate::mcp::{McpContext, McpServer};

/// Start the MCP server with stdio transport. A missing index is built
/// first; a stale one is brought up to date.
pub async fn serve_stdio(project: String, watch: bool) -> Result<()> {
    let indexer = open_project(&project)?;
    info!("MCP server (stdio) for project: {}", project);

    let index_path = indexer.index_path();
    let prior = store::load_if_exists(&index_path)
        .with_context(|| format!("Failed to load index from {}", index_path.display()))?;

    let indexer = Arc::new(indexer);
    let worker = Arc::clone(&indexer);
    let report = tokio::task::spawn_blocking(move || match prior {
        Some(prior) => worker.update(prior),
        None => {
            warn!("No index at {}, building one", worker.index_path().display());
            worker.full_scan()
        }
    })
    .await
    .context("Indexing task panicked")??;
    store::save(&report.index, &index_path)
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;

    let ctx = McpContext::new(Arc::clone(&indexer), report.index);

    if watch || indexer.config().indexing.watch {
        let watcher = FileWatcher::new(Arc::clone(&indexer), Arc::clone(&ctx.state));
        tokio::spawn(async move {
            if let Err(e) = watcher.watch().await {
                error!("File watcher stopped: {:#}", e);
            }
        });
    }

    McpServer::new(ctx).run().await
}
