//! Error types for the matchmaker core library.

use std::path::PathBuf;

/// Top-level error enum for the matchmaker core library.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Parse error in {}:{line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MatchError {
    pub fn parse(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        MatchError::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Snapshot failures are recoverable: the caller rebuilds from source.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MatchError::Snapshot(_) | MatchError::Json(_))
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
