// Read-side operations over a stored index

pub mod engine;
pub mod staleness;

pub use engine::{IndexStats, QueryEngine, QueryResult, SymbolQuery};
pub use staleness::{check_git, check_hashes, CheckMethod, StalenessReport};
