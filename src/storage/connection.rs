//! Database connection management
//!
//! Opens the SQLite file (creating its directory), applies the pragmas the
//! index relies on and makes sure the schema exists.

use crate::error::{IndexError, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the index database at `db_path`
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let db_dir = db_path
        .parent()
        .ok_or_else(|| IndexError::InvalidPath(format!("Invalid database path: {}", db_path.display())))?;

    if !db_dir.as_os_str().is_empty() {
        std::fs::create_dir_all(db_dir).map_err(IndexError::Io)?;
    }

    let conn = Connection::open(db_path).map_err(IndexError::Database)?;

    // Enable WAL mode for better concurrent access
    conn.pragma_update(None, "journal_mode", WAL)?;
    configure(&conn)?;

    tracing::info!("[Storage] Database opened at: {}", db_path.display());
    Ok(conn)
}

/// Private in-memory database, used by tests and throwaway engines
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // Cascades from files to chunks/symbols depend on this
    conn.pragma_update(None, "foreign_keys", ON)?;
    conn.pragma_update(None, "synchronous", NORMAL)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    crate::storage::init::create_tables(conn)?;
    Ok(())
}

// SQL pragma constants
const WAL: &str = "WAL";
const ON: &str = "ON";
const NORMAL: &str = "NORMAL";
