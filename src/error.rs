//! Error types for semindex

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    /// The file vanished, is unreadable, or is not text.
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl IndexError {
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::FileRead { path: path.into(), source }
    }
}

impl From<notify::Error> for IndexError {
    fn from(e: notify::Error) -> Self {
        IndexError::Watcher(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
