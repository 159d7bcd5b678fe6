//! Database schema
//!
//! Four tables: files, chunks, symbols, relationships. Everything hangs off
//! `files` with `ON DELETE CASCADE`, so removing a file row removes the rest.

use crate::error::Result;
use rusqlite::Connection;

/// Create all required tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    create_files_table(conn)?;
    create_chunks_table(conn)?;
    create_symbol_tables(conn)?;
    Ok(())
}

fn create_files_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS files (
            file_id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            content_hash TEXT NOT NULL,
            mtime INTEGER NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            language TEXT NOT NULL DEFAULT 'unknown',
            indexed_at INTEGER NOT NULL
        );
    "#)?;
    tracing::debug!("[Storage] Created files table");
    Ok(())
}

fn create_chunks_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS chunks (
            chunk_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            embedding_state TEXT NOT NULL DEFAULT 'embedded',

            UNIQUE(file_id, chunk_index),
            FOREIGN KEY (file_id) REFERENCES files(file_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);
    "#)?;
    tracing::debug!("[Storage] Created chunks table");
    Ok(())
}

fn create_symbol_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS symbols (
            symbol_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,

            FOREIGN KEY (file_id) REFERENCES files(file_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);

        CREATE TABLE IF NOT EXISTS relationships (
            from_symbol INTEGER NOT NULL,
            to_symbol INTEGER NOT NULL,
            kind TEXT NOT NULL,

            PRIMARY KEY (from_symbol, to_symbol, kind),
            FOREIGN KEY (from_symbol) REFERENCES symbols(symbol_id) ON DELETE CASCADE,
            FOREIGN KEY (to_symbol) REFERENCES symbols(symbol_id) ON DELETE CASCADE
        );
    "#)?;
    tracing::debug!("[Storage] Created symbols/relationships tables");
    Ok(())
}
