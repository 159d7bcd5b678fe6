//! SQLite-backed `Storage`
//!
//! One connection behind a mutex. Reads and writes are serialized on it; WAL
//! keeps readers in other processes from blocking on our writes.

use crate::error::{IndexError, Result};
use crate::storage::{
    check_relationships, connection, ChunkRecord, FileRecord, IndexStats, NewChunk, NewFile,
    NewRelationship, NewSymbol, Repository, Storage,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

pub struct SqliteStorage {
    /// `None` once closed
    conn: Mutex<Option<Connection>>,
    dimension: usize,
}

impl SqliteStorage {
    pub fn open(db_path: &Path, dimension: usize) -> Result<Self> {
        let conn = connection::open_connection(db_path)?;
        Ok(Self { conn: Mutex::new(Some(conn)), dimension })
    }

    pub fn open_in_memory(dimension: usize) -> Result<Self> {
        let conn = connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(Some(conn)), dimension })
    }

    fn with_repo<T>(&self, f: impl FnOnce(&mut Repository<'_>) -> Result<T>) -> Result<T> {
        let mut conn_guard = self
            .conn
            .lock()
            .map_err(|_| IndexError::Store("Poisoned lock".into()))?;
        let conn = conn_guard
            .as_mut()
            .ok_or_else(|| IndexError::Store("Database is closed".into()))?;
        let mut repo = Repository::new(conn, self.dimension);
        f(&mut repo)
    }
}

impl Storage for SqliteStorage {
    fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        self.with_repo(|repo| repo.get_file_by_path(path))
    }

    fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.with_repo(|repo| repo.get_all_files())
    }

    fn file_chunks(&self, path: &str) -> Result<Vec<ChunkRecord>> {
        self.with_repo(|repo| repo.get_file_chunks(path))
    }

    fn all_chunks(&self) -> Result<Vec<ChunkRecord>> {
        self.with_repo(|repo| {
            let mut chunks = Vec::new();
            repo.scan_all_chunks(|chunk| {
                chunks.push(chunk);
                Ok(())
            })?;
            Ok(chunks)
        })
    }

    fn replace_file(&self, file: &NewFile, chunks: &[NewChunk]) -> Result<i64> {
        self.with_repo(|repo| repo.replace_file(file, chunks))
    }

    fn remove_file(&self, path: &str) -> Result<bool> {
        self.with_repo(|repo| repo.delete_file(path))
    }

    fn put_symbols(&self, path: &str, symbols: &[NewSymbol], relationships: &[NewRelationship]) -> Result<()> {
        check_relationships(symbols, relationships)?;
        self.with_repo(|repo| repo.replace_symbols(path, symbols, relationships))
    }

    fn stats(&self) -> Result<IndexStats> {
        self.with_repo(|repo| repo.stats())
    }

    fn clear(&self) -> Result<()> {
        self.with_repo(|repo| repo.clear())
    }

    fn vacuum(&self) -> Result<()> {
        self.with_repo(|repo| repo.vacuum())
    }

    fn close(&self) -> Result<()> {
        let mut conn_guard = self
            .conn
            .lock()
            .map_err(|_| IndexError::Store("Poisoned lock".into()))?;
        if let Some(conn) = conn_guard.take() {
            conn.close().map_err(|(_, e)| IndexError::Database(e))?;
            tracing::info!("[Storage] Database closed");
        }
        Ok(())
    }
}
