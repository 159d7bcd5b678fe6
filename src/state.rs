// FILE: src/state.rs

use crate::config::IndexerConfig;
use crate::embedding::EmbeddingClient;
use crate::storage::Storage;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Whether a stored vector came from the provider or is the zero fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingState {
    Embedded,
    Fallback,
}

impl EmbeddingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingState::Embedded => "embedded",
            EmbeddingState::Fallback => "fallback",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "embedded" => EmbeddingState::Embedded,
            _ => EmbeddingState::Fallback,
        }
    }
}

/// Result of a semantic search operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub content: String,
    pub score: f32,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding_state: EmbeddingState,
}

/// A filesystem change, already filtered by the scanner rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileEvent::Added(p) | FileEvent::Changed(p) | FileEvent::Removed(p) => p,
        }
    }
}

/// Options for a full repository pass
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Overrides the configured ignore patterns when set
    pub ignore_patterns: Option<Vec<String>>,
    /// Overrides the configured extension allowlist when set
    pub extensions: Option<Vec<String>>,
    /// Drop stored records under the root that are gone or now ignored
    pub prune_missing: bool,
    /// Checked between files
    pub cancel: Option<CancellationToken>,
}

/// Outcome of `index_repository`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub total_files: usize,
    pub indexed_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub removed_files: usize,
    pub duration_ms: u64,
    pub cancelled: bool,
}

/// State shared by the indexer, searcher and librarian of one engine
pub struct EngineState {
    pub storage: Arc<dyn Storage>,
    pub embedder: EmbeddingClient,
    pub config: IndexerConfig,

    /// Serializes writers of the same path (scan vs. watcher)
    pub path_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

/// Shared state wrapper for easy cloning and sharing
pub type SharedState = Arc<EngineState>;

impl EngineState {
    pub fn new(storage: Arc<dyn Storage>, embedder: EmbeddingClient, config: IndexerConfig) -> Self {
        Self { storage, embedder, config, path_locks: DashMap::new() }
    }

    /// Wait for the write lock of `path`. The lock entry is dropped from
    /// the table once the last holder and waiter are gone.
    pub async fn lock_path(&self, path: &str) -> PathGuard<'_> {
        let lock = self
            .path_locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        PathGuard { locks: &self.path_locks, key: path.to_string(), guard: Some(guard) }
    }
}

/// Held write lock for one path
pub struct PathGuard<'a> {
    locks: &'a DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    key: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        // Release first so our Arc no longer counts
        self.guard.take();
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
