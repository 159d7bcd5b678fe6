// FILE: src/storage/repository.rs
use crate::error::{IndexError, Result};
use crate::state::EmbeddingState;
use crate::storage::vec_index::{bytes_to_embedding, embedding_to_bytes};
use crate::storage::{ChunkRecord, FileRecord, IndexStats, NewChunk, NewFile, NewRelationship, NewSymbol};
use rusqlite::{params, Connection, OptionalExtension, Row};

const FILE_COLUMNS: &str = "file_id, path, content_hash, mtime, size, language, indexed_at";

const CHUNK_SELECT: &str = "SELECT c.file_id, f.path, c.chunk_index, c.content, c.start_line, c.end_line, c.embedding, c.embedding_state
     FROM chunks c JOIN files f ON c.file_id = f.file_id";

pub struct Repository<'a> {
    conn: &'a mut Connection,
    dimension: usize,
}

impl<'a> Repository<'a> {
    pub fn new(conn: &'a mut Connection, dimension: usize) -> Self {
        Self { conn, dimension }
    }

    pub fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {} FROM files WHERE path = ?1", FILE_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![path], file_from_row)
            .optional()?;
        Ok(record)
    }

    pub fn get_all_files(&self) -> Result<Vec<FileRecord>> {
        let sql = format!("SELECT {} FROM files ORDER BY path", FILE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], file_from_row)?;
        let mut results = Vec::new();
        for r in rows { results.push(r?); }
        Ok(results)
    }

    pub fn get_file_chunks(&self, path: &str) -> Result<Vec<ChunkRecord>> {
        let sql = format!("{} WHERE f.path = ?1 ORDER BY c.chunk_index", CHUNK_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![path], raw_chunk_from_row)?;
        let mut results = Vec::new();
        for r in rows { results.push(self.decode(r?)); }
        Ok(results)
    }

    /// Streams every chunk through `callback`, avoiding a second copy of the
    /// whole index when the caller only needs to score rows.
    pub fn scan_all_chunks<F>(&self, mut callback: F) -> Result<()>
    where F: FnMut(ChunkRecord) -> Result<()>
    {
        let sql = format!("{} ORDER BY f.path, c.chunk_index", CHUNK_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], raw_chunk_from_row)?;
        for row in rows {
            callback(self.decode(row?))?;
        }
        Ok(())
    }

    /// Delete-and-reinsert for one file, inside a single transaction.
    ///
    /// The old row goes first so its chunks and symbols cascade away; a
    /// failure anywhere rolls back to the previous state.
    pub fn replace_file(&mut self, file: &NewFile, chunks: &[NewChunk]) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM files WHERE path = ?1", params![file.path])?;
        tx.execute(
            "INSERT INTO files (path, content_hash, mtime, size, language, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.path,
                file.content_hash,
                file.mtime as i64,
                file.size as i64,
                file.language,
                file.indexed_at as i64
            ],
        )?;
        let file_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (file_id, chunk_index, content, start_line, end_line, embedding, embedding_state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (index, chunk) in chunks.iter().enumerate() {
                stmt.execute(params![
                    file_id,
                    index as i64,
                    chunk.content,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    embedding_to_bytes(&chunk.embedding),
                    chunk.embedding_state.as_str()
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!("[Repository] Replaced {} (file_id: {}, {} chunks)", file.path, file_id, chunks.len());
        Ok(file_id)
    }

    pub fn delete_file(&self, path: &str) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(rows > 0)
    }

    pub fn replace_symbols(
        &mut self,
        path: &str,
        symbols: &[NewSymbol],
        relationships: &[NewRelationship],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        let file_id: i64 = tx
            .query_row("SELECT file_id FROM files WHERE path = ?1", params![path], |r| r.get(0))
            .optional()?
            .ok_or_else(|| IndexError::Store(format!("File not indexed: {}", path)))?;

        tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        let mut ids = Vec::with_capacity(symbols.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbols (file_id, name, kind, start_line, end_line) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for symbol in symbols {
                stmt.execute(params![
                    file_id,
                    symbol.name,
                    symbol.kind,
                    symbol.start_line as i64,
                    symbol.end_line as i64
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO relationships (from_symbol, to_symbol, kind) VALUES (?1, ?2, ?3)",
            )?;
            for rel in relationships {
                stmt.execute(params![ids[rel.from], ids[rel.to], rel.kind])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n as usize)
        };
        let total_size: i64 = self
            .conn
            .query_row("SELECT COALESCE(SUM(size), 0) FROM files", [], |r| r.get(0))?;
        Ok(IndexStats {
            files: count("files")?,
            chunks: count("chunks")?,
            symbols: count("symbols")?,
            relationships: count("relationships")?,
            total_size: total_size as u64,
        })
    }

    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM relationships;
             DELETE FROM symbols;
             DELETE FROM chunks;
             DELETE FROM files;",
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Flush the WAL into the main file, then rebuild it to reclaim pages.
    pub fn vacuum(&self) -> Result<()> {
        // Returns a (busy, log, checkpointed) row
        self.conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    fn decode(&self, raw: RawChunk) -> ChunkRecord {
        let embedding = match bytes_to_embedding(&raw.blob, self.dimension) {
            Some(v) => v,
            None => {
                tracing::warn!(
                    "[Repository] Chunk {}#{} has a {}-byte embedding, expected {} dims",
                    raw.path, raw.chunk_index, raw.blob.len(), self.dimension
                );
                Vec::new()
            }
        };
        ChunkRecord {
            file_id: raw.file_id,
            path: raw.path,
            chunk_index: raw.chunk_index,
            content: raw.content,
            start_line: raw.start_line,
            end_line: raw.end_line,
            embedding,
            embedding_state: EmbeddingState::parse(&raw.state),
        }
    }
}

struct RawChunk {
    file_id: i64,
    path: String,
    chunk_index: usize,
    content: String,
    start_line: usize,
    end_line: usize,
    blob: Vec<u8>,
    state: String,
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        mtime: row.get::<_, i64>(3)? as u64,
        size: row.get::<_, i64>(4)? as u64,
        language: row.get(5)?,
        indexed_at: row.get::<_, i64>(6)? as u64,
    })
}

fn raw_chunk_from_row(row: &Row<'_>) -> rusqlite::Result<RawChunk> {
    Ok(RawChunk {
        file_id: row.get(0)?,
        path: row.get(1)?,
        chunk_index: row.get::<_, i64>(2)? as usize,
        content: row.get(3)?,
        start_line: row.get::<_, i64>(4)? as usize,
        end_line: row.get::<_, i64>(5)? as usize,
        blob: row.get(6)?,
        state: row.get(7)?,
    })
}
