//! In-memory `Storage` for tests and ephemeral engines

use crate::error::{IndexError, Result};
use crate::storage::{
    check_relationships, ChunkRecord, FileRecord, IndexStats, NewChunk, NewFile, NewRelationship,
    NewSymbol, Storage,
};
use std::collections::BTreeMap;
use std::sync::RwLock;

struct Entry {
    record: FileRecord,
    chunks: Vec<ChunkRecord>,
    symbols: usize,
    relationships: usize,
}

#[derive(Default)]
struct Tables {
    files: BTreeMap<String, Entry>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| IndexError::Store("Poisoned lock".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| IndexError::Store("Poisoned lock".into()))
    }
}

impl Storage for MemoryStorage {
    fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        Ok(self.read()?.files.get(path).map(|e| e.record.clone()))
    }

    fn list_files(&self) -> Result<Vec<FileRecord>> {
        Ok(self.read()?.files.values().map(|e| e.record.clone()).collect())
    }

    fn file_chunks(&self, path: &str) -> Result<Vec<ChunkRecord>> {
        Ok(self.read()?.files.get(path).map(|e| e.chunks.clone()).unwrap_or_default())
    }

    fn all_chunks(&self) -> Result<Vec<ChunkRecord>> {
        Ok(self.read()?.files.values().flat_map(|e| e.chunks.iter().cloned()).collect())
    }

    fn replace_file(&self, file: &NewFile, chunks: &[NewChunk]) -> Result<i64> {
        let mut tables = self.write()?;
        tables.next_id += 1;
        let file_id = tables.next_id;
        let chunks = chunks
            .iter()
            .enumerate()
            .map(|(index, c)| ChunkRecord {
                file_id,
                path: file.path.clone(),
                chunk_index: index,
                content: c.content.clone(),
                start_line: c.start_line,
                end_line: c.end_line,
                embedding: c.embedding.clone(),
                embedding_state: c.embedding_state,
            })
            .collect();
        let record = FileRecord {
            file_id,
            path: file.path.clone(),
            content_hash: file.content_hash.clone(),
            mtime: file.mtime,
            size: file.size,
            language: file.language.clone(),
            indexed_at: file.indexed_at,
        };
        // Insert replaces the previous entry whole, symbols included
        tables
            .files
            .insert(file.path.clone(), Entry { record, chunks, symbols: 0, relationships: 0 });
        Ok(file_id)
    }

    fn remove_file(&self, path: &str) -> Result<bool> {
        Ok(self.write()?.files.remove(path).is_some())
    }

    fn put_symbols(&self, path: &str, symbols: &[NewSymbol], relationships: &[NewRelationship]) -> Result<()> {
        check_relationships(symbols, relationships)?;
        let mut tables = self.write()?;
        let entry = tables
            .files
            .get_mut(path)
            .ok_or_else(|| IndexError::Store(format!("File not indexed: {}", path)))?;
        entry.symbols = symbols.len();
        entry.relationships = relationships.len();
        Ok(())
    }

    fn stats(&self) -> Result<IndexStats> {
        let tables = self.read()?;
        let mut stats = IndexStats::default();
        for entry in tables.files.values() {
            stats.files += 1;
            stats.chunks += entry.chunks.len();
            stats.symbols += entry.symbols;
            stats.relationships += entry.relationships;
            stats.total_size += entry.record.size;
        }
        Ok(stats)
    }

    fn clear(&self) -> Result<()> {
        self.write()?.files.clear();
        Ok(())
    }

    fn vacuum(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
