//! semindex: semantic index of a source repository
//!
//! Files under a root are scanned, hashed, chunked by line, embedded and
//! stored in SQLite; queries are embedded the same way and ranked by cosine
//! similarity. A watcher keeps the index current as files change.
//!
//! - Engine (scan → change gate → chunk → embed → store, and search)
//! - Librarian (background watcher - feeds single-file updates)
//! - Storage (SQLite or in-memory, behind the `Storage` trait)

pub mod config;
pub mod core;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod librarian;
pub mod state;
pub mod storage;

pub use config::{EmbeddingConfig, IndexerConfig};
pub use embedding::{Embedding, EmbeddingClient, EmbeddingProvider};
pub use engine::IndexEngine;
pub use error::{IndexError, Result};
pub use librarian::{ChangeCallback, NotifyWatcher, Watcher};
pub use state::{EmbeddingState, FileEvent, IndexOptions, IndexReport, SearchResult};
pub use storage::{
    ChunkRecord, FileRecord, IndexStats, MemoryStorage, NewRelationship, NewSymbol, SqliteStorage, Storage,
};
