//! Change detection by content hash

use crate::storage::FileRecord;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Stored hash matches; keep the existing chunks
    Skip,
    /// New or changed content; replace the whole file
    Reindex,
}

pub fn detect_change(existing: Option<&FileRecord>, hash: &str) -> Change {
    match existing {
        Some(record) if record.content_hash == hash => Change::Skip,
        _ => Change::Reindex,
    }
}
