// MCP (Model Context Protocol) stdio server over a shared index

pub mod server;
pub mod tools;

use parking_lot::RwLock;
use std::sync::Arc;

use crate::index::Index;
use crate::indexer::Indexer;

pub use server::McpServer;

/// State shared between the server and an optional file watcher.
#[derive(Clone)]
pub struct McpContext {
    pub indexer: Arc<Indexer>,
    pub state: Arc<RwLock<Index>>,
}

impl McpContext {
    pub fn new(indexer: Arc<Indexer>, index: Index) -> Self {
        Self {
            indexer,
            state: Arc::new(RwLock::new(index)),
        }
    }
}
