// FILE: src/engine/mod.rs
//! The indexing engine: one store, one embedding client, one watcher.

pub mod chunker;
pub mod indexer;
pub mod scanner;
pub mod searcher;

use crate::config::IndexerConfig;
use crate::core::Bouncer;
use crate::embedding::{ClientSettings, EmbeddingClient, EmbeddingProvider, OllamaProvider};
use crate::error::{IndexError, Result};
use crate::librarian::{ChangeCallback, Librarian, NotifyWatcher, Watcher};
use crate::state::{EngineState, IndexOptions, IndexReport, SearchResult, SharedState};
use crate::storage::{ChunkRecord, FileRecord, IndexStats, NewRelationship, NewSymbol, SqliteStorage, Storage};
use indexer::Indexer;
use searcher::Searcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Run a storage call on the blocking pool.
pub(crate) async fn with_storage<T, F>(state: &SharedState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Storage) -> Result<T> + Send + 'static,
{
    let storage = Arc::clone(&state.storage);
    tokio::task::spawn_blocking(move || f(storage.as_ref()))
        .await
        .map_err(|e| IndexError::Other(anyhow::anyhow!("Storage task failed: {}", e)))?
}

/// Absolute, symlink-free form of `path`. For a path that no longer exists
/// the parent is resolved instead, so removals key the same as inserts.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| absolute.clone())),
        _ => Ok(absolute),
    }
}

/// Store key for a resolved path
pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub struct IndexEngine {
    state: SharedState,
    librarian: Mutex<Librarian>,
}

impl IndexEngine {
    /// Build an engine from injected parts.
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn EmbeddingProvider>,
        watcher: Box<dyn Watcher>,
        config: IndexerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if provider.dimension() != config.embedding.dimension {
            tracing::warn!(
                "[Engine] Provider '{}' produces {} dims but config says {}; using the provider's",
                provider.name(), provider.dimension(), config.embedding.dimension
            );
        }

        let embedder = EmbeddingClient::new(provider, ClientSettings::from(&config.embedding));
        let state = Arc::new(EngineState::new(storage, embedder, config));
        Ok(Self { state, librarian: Mutex::new(Librarian::new(watcher)) })
    }

    /// SQLite store at `config.db_path`, the configured provider and a
    /// `notify` watcher.
    pub async fn open(config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        let provider = Self::build_provider(&config).await?;
        tracing::info!("[Engine] Embedding provider: {} ({} dims)", provider.name(), provider.dimension());

        let storage = SqliteStorage::open(&config.db_path, provider.dimension())?;
        tracing::info!("[Engine] Database initialized: {}", config.db_path.display());

        Self::new(Arc::new(storage), provider, Box::new(NotifyWatcher::new()), config)
    }

    async fn build_provider(config: &IndexerConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let embedding = &config.embedding;
        match embedding.provider.as_str() {
            #[cfg(feature = "local-embeddings")]
            "fastembed" => Ok(Arc::new(crate::embedding::FastEmbedProvider::load().await?)),
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                &embedding.endpoint,
                &embedding.model,
                embedding.dimension,
                embedding.max_input_chars,
            )?)),
            other => Err(IndexError::Config(format!("Unknown or disabled embedding provider: {}", other))),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.state.config
    }

    /// Index one file, or skip it when its content hash is unchanged.
    /// `content` stands in for reading the file.
    pub async fn index_file(&self, path: &Path, content: Option<String>) -> Result<bool> {
        Indexer::index_file(&self.state, path, content).await
    }

    pub async fn index_repository(&self, root: &Path, options: IndexOptions) -> Result<IndexReport> {
        Indexer::index_repository(&self.state, root, options).await
    }

    /// `top_k` of `None` uses the configured default.
    pub async fn search_similar(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        let top_k = top_k.unwrap_or(self.state.config.default_top_k);
        Searcher::search(&self.state, query, top_k).await
    }

    pub async fn get_file_info(&self, path: &Path) -> Result<Option<FileRecord>> {
        let key = path_key(&resolve_path(path)?);
        with_storage(&self.state, move |s| s.get_file(&key)).await
    }

    pub async fn list_indexed_files(&self) -> Result<Vec<FileRecord>> {
        with_storage(&self.state, |s| s.list_files()).await
    }

    pub async fn get_file_chunks(&self, path: &Path) -> Result<Vec<ChunkRecord>> {
        let key = path_key(&resolve_path(path)?);
        with_storage(&self.state, move |s| s.file_chunks(&key)).await
    }

    /// Delete a file's record. A path still present on disk is re-indexed.
    pub async fn remove_file(&self, path: &Path) -> Result<bool> {
        Indexer::remove_file(&self.state, path).await
    }

    /// Attach symbols from an external analysis pass to an indexed file.
    pub async fn put_symbols(
        &self,
        path: &Path,
        symbols: Vec<NewSymbol>,
        relationships: Vec<NewRelationship>,
    ) -> Result<()> {
        let key = path_key(&resolve_path(path)?);
        let _guard = self.state.lock_path(&key).await;
        with_storage(&self.state, move |s| s.put_symbols(&key, &symbols, &relationships)).await
    }

    /// Watch `root` using the configured scanner rules. Replaces any
    /// running watch.
    pub async fn start_file_watching(&self, root: &Path, on_change: Option<ChangeCallback>) -> Result<()> {
        let root = resolve_path(root)?;
        if !root.is_dir() {
            return Err(IndexError::InvalidPath(format!("Not a directory: {}", root.display())));
        }
        let config = &self.state.config;
        let bouncer = Bouncer::new(&root, &config.ignore_patterns, &config.extensions)?;
        self.librarian
            .lock()
            .await
            .start(Arc::clone(&self.state), bouncer, on_change)
            .await
    }

    pub async fn stop_file_watching(&self) -> Result<()> {
        self.librarian.lock().await.stop().await
    }

    pub async fn is_watching(&self) -> bool {
        self.librarian.lock().await.is_running()
    }

    pub async fn get_index_stats(&self) -> Result<IndexStats> {
        with_storage(&self.state, |s| s.stats()).await
    }

    pub async fn clear_index(&self) -> Result<()> {
        with_storage(&self.state, |s| s.clear()).await?;
        tracing::info!("[Engine] Index cleared");
        Ok(())
    }

    pub async fn vacuum_index(&self) -> Result<()> {
        with_storage(&self.state, |s| s.vacuum()).await?;
        tracing::info!("[Engine] Index vacuumed");
        Ok(())
    }

    /// Stop watching and close the store. Later calls fail with a store error.
    pub async fn close(&self) -> Result<()> {
        self.stop_file_watching().await?;
        with_storage(&self.state, |s| s.close()).await?;
        tracing::info!("[Engine] Closed");
        Ok(())
    }
}
