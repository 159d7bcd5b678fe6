// FILE: src/storage/mod.rs
pub mod connection;
pub mod init;
pub mod memory;
pub mod repository;
pub mod sqlite;
pub mod text_extraction;
pub mod vec_index;

use crate::error::Result;
use crate::state::EmbeddingState;
use serde::{Deserialize, Serialize};

// Common exports
pub use memory::MemoryStorage;
pub use repository::Repository;
pub use sqlite::SqliteStorage;
pub use text_extraction::{detect_language, read_text};

// Data Types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: i64,
    pub path: String,
    pub content_hash: String,
    pub mtime: u64,
    pub size: u64,
    pub language: String,
    pub indexed_at: u64,
}

impl std::fmt::Display for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {} bytes)", self.path, self.language, self.size)
    }
}

/// File row to insert; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub content_hash: String,
    pub mtime: u64,
    pub size: u64,
    pub language: String,
    pub indexed_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub file_id: i64,
    pub path: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding: Vec<f32>,
    pub embedding_state: EmbeddingState,
}

/// Chunk to insert; `chunk_index` is its position in the slice.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding: Vec<f32>,
    pub embedding_state: EmbeddingState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSymbol {
    pub name: String,
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Edge between two symbols of the same `put_symbols` call, by slice index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelationship {
    pub from: usize,
    pub to: usize,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files: usize,
    pub chunks: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub total_size: u64,
}

/// Persistence seam of the engine.
///
/// Every method is blocking; the engine calls them from the blocking pool.
/// `replace_file` and `remove_file` must be atomic per file.
pub trait Storage: Send + Sync {
    fn get_file(&self, path: &str) -> Result<Option<FileRecord>>;

    fn list_files(&self) -> Result<Vec<FileRecord>>;

    /// Chunks of one file ordered by `chunk_index`.
    fn file_chunks(&self, path: &str) -> Result<Vec<ChunkRecord>>;

    /// Every stored chunk, for brute-force ranking.
    fn all_chunks(&self) -> Result<Vec<ChunkRecord>>;

    /// Delete any previous row for `file.path` (cascading) and insert the new
    /// file with its full chunk set.
    fn replace_file(&self, file: &NewFile, chunks: &[NewChunk]) -> Result<i64>;

    /// Returns whether a record existed.
    fn remove_file(&self, path: &str) -> Result<bool>;

    /// Replace the symbol set of an indexed file.
    fn put_symbols(
        &self,
        path: &str,
        symbols: &[NewSymbol],
        relationships: &[NewRelationship],
    ) -> Result<()>;

    fn stats(&self) -> Result<IndexStats>;

    fn clear(&self) -> Result<()>;

    fn vacuum(&self) -> Result<()>;

    fn close(&self) -> Result<()>;
}

pub(crate) fn check_relationships(symbols: &[NewSymbol], relationships: &[NewRelationship]) -> Result<()> {
    for rel in relationships {
        if rel.from >= symbols.len() || rel.to >= symbols.len() {
            return Err(crate::error::IndexError::Store(format!(
                "Relationship {} -> {} out of range ({} symbols)",
                rel.from,
                rel.to,
                symbols.len()
            )));
        }
    }
    Ok(())
}
