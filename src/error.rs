// Error taxonomy for indexing and queries

use std::path::PathBuf;

/// Errors produced by the indexing core.
///
/// Only `IndexCorrupt`, `Config`, `Io`, `Json` and `Cancelled` abort an
/// operation. `ParseDegraded`, `UnreadableFile` and `ConfigInvalid` are
/// collected as warnings while the scan carries on.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("{path}: parse degraded ({reason})")]
    ParseDegraded { path: String, reason: String },

    #[error("{}: unreadable: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("invalid rule '{rule}': {reason}")]
    ConfigInvalid { rule: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no parser registered for {0}")]
    NoParser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scan cancelled")]
    Cancelled,
}

impl IndexError {
    /// Whether the error only degrades a single file or rule.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            IndexError::ParseDegraded { .. }
                | IndexError::UnreadableFile { .. }
                | IndexError::ConfigInvalid { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
