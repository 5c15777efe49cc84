// CLI command implementations

pub mod check;
pub mod coupling;
pub mod impact;
pub mod index;
pub mod languages;
pub mod query;
pub mod serve;
pub mod stats;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Config;
use crate::index::{store, Index};
use crate::indexer::Indexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Indexer for a project directory with its `.codeindex.toml` applied.
pub fn open_project(project: &str) -> Result<Indexer> {
    let root = PathBuf::from(project);
    if !root.is_dir() {
        anyhow::bail!("Project directory not found: {}", project);
    }
    let config = Config::from_project_dir(&root);
    Ok(Indexer::new(root, config))
}

/// Load the stored index of a project, failing with a hint when none exists.
pub fn load_index(indexer: &Indexer) -> Result<Index> {
    let path = indexer.index_path();
    store::load_if_exists(&path)
        .with_context(|| format!("Failed to load index from {}", path.display()))?
        .with_context(|| {
            format!(
                "No index at {}. Run 'codeindex index --project {}' first.",
                path.display(),
                indexer.root().display()
            )
        })
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
