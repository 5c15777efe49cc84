// File watcher driving incremental updates

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::IndexError;
use crate::index::paths::relative_path;
use crate::index::{store, Index, UpdateCounts};
use crate::indexer::Indexer;

/// Watches a project root and keeps a shared index current.
pub struct FileWatcher {
    indexer: Arc<Indexer>,
    state: Arc<RwLock<Index>>,
    watch_path: PathBuf,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new(indexer: Arc<Indexer>, state: Arc<RwLock<Index>>) -> Self {
        let root = indexer.root().to_path_buf();
        let watch_path = std::fs::canonicalize(&root).unwrap_or(root);
        let debounce = Duration::from_millis(indexer.config().indexing.debounce_ms);
        Self {
            indexer,
            state,
            watch_path,
            debounce,
        }
    }

    /// Watch until the event channel closes. Each quiet period after a burst
    /// of relevant events triggers one incremental update and a save.
    pub async fn watch(&self) -> Result<()> {
        info!("Starting file watcher for: {}", self.watch_path.display());

        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(256);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Runs on the notify thread, outside the runtime
                if tx.blocking_send(res).is_err() {
                    debug!("Watcher channel closed");
                }
            },
            Config::default(),
        )?;
        watcher.watch(&self.watch_path, RecursiveMode::Recursive)?;
        info!("File watcher started. Monitoring for changes...");

        while let Some(first) = rx.recv().await {
            let mut batch = BTreeSet::new();
            self.collect(first, &mut batch);
            while let Ok(Some(next)) = tokio::time::timeout(self.debounce, rx.recv()).await {
                self.collect(next, &mut batch);
            }
            if batch.is_empty() {
                continue;
            }

            info!("{} changed files, updating index", batch.len());
            match self.apply().await {
                Ok(counts) => info!(
                    "Index updated: {} added, {} updated, {} deleted",
                    counts.added, counts.updated, counts.deleted
                ),
                Err(e) if matches!(e.downcast_ref::<IndexError>(), Some(IndexError::Cancelled)) => {
                    info!("Update cancelled, stopping watcher");
                    break;
                }
                // A failed update never stops the watcher
                Err(e) => error!("Incremental update failed: {:#}", e),
            }
        }

        Ok(())
    }

    fn collect(&self, res: notify::Result<Event>, batch: &mut BTreeSet<String>) {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!("File watch error: {}", e);
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for path in &event.paths {
            let relative = relative_path(&self.watch_path, path);
            if self.indexer.is_indexable(&relative) {
                debug!("File event {:?}: {}", event.kind, relative);
                batch.insert(relative);
            }
        }
    }

    async fn apply(&self) -> Result<UpdateCounts> {
        let indexer = Arc::clone(&self.indexer);
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || -> Result<UpdateCounts> {
            let prior = state.read().clone();
            let report = indexer.update(prior)?;
            let path = indexer.index_path();
            store::save(&report.index, &path)
                .with_context(|| format!("Failed to save index to {}", path.display()))?;
            *state.write() = report.index;
            Ok(report.counts)
        })
        .await
        .context("Update task panicked")?
    }
}

/// Watch `indexer`'s root, starting from `index`. Blocks until the watcher
/// stops.
pub async fn start_watcher(indexer: Arc<Indexer>, index: Index) -> Result<()> {
    let state = Arc::new(RwLock::new(index));
    FileWatcher::new(indexer, state).watch().await
}
