//! Incremental code index: symbols, a resolved call graph and the
//! analytics built on it (centrality, execution flows, change impact,
//! file coupling, duplicate bodies), kept current by hash-based updates.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod indexer;
pub mod mcp;
pub mod query;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{IndexError, Result};
pub use index::Index;
pub use indexer::{Indexer, ScanReport};
