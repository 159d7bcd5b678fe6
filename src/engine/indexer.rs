// FILE: src/engine/indexer.rs
use crate::core::{content_hash, detect_change, Bouncer, Change};
use crate::engine::chunker::chunk_text;
use crate::engine::scanner::Scanner;
use crate::engine::{path_key, resolve_path, unix_secs, with_storage};
use crate::error::{IndexError, Result};
use crate::state::{IndexOptions, IndexReport, SharedState};
use crate::storage::{detect_language, read_text, NewChunk, NewFile};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

pub struct Indexer;

impl Indexer {
    /// Orchestrates the indexing of a single file:
    /// 1. Read text (or take the supplied content)
    /// 2. Hash and compare against the stored record; stop if unchanged
    /// 3. Chunk text
    /// 4. Generate embeddings (BATCHED, never fails)
    /// 5. Replace file + chunks (TRANSACTIONAL)
    ///
    /// Returns `true` if the store was written, `false` if the hash matched.
    pub async fn index_file(state: &SharedState, path: &Path, content: Option<String>) -> Result<bool> {
        let path = resolve_path(path)?;
        let key = path_key(&path);
        let _guard = state.lock_path(&key).await;
        Self::index_locked(state, &path, key, content).await
    }

    /// Caller must hold the path lock for `key`.
    async fn index_locked(state: &SharedState, path: &Path, key: String, content: Option<String>) -> Result<bool> {
        tracing::debug!("[Indexer] Processing: {}", key);

        // 1. Read
        let (text, mtime, size) = match content {
            Some(text) => {
                let mtime = tokio::fs::metadata(path)
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(unix_secs)
                    .unwrap_or_else(|| unix_secs(SystemTime::now()));
                let size = text.len() as u64;
                (text, mtime, size)
            }
            None => {
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || -> Result<(String, u64, u64)> {
                    let text = read_text(&owned)?;
                    let metadata = std::fs::metadata(&owned).map_err(|e| IndexError::file_read(&owned, e))?;
                    let mtime = metadata.modified().map(unix_secs).unwrap_or(0);
                    Ok((text, mtime, metadata.len()))
                })
                .await
                .map_err(|_| IndexError::Other(anyhow::anyhow!("Read task panic")))??
            }
        };

        // 2. Change detection
        let hash = content_hash(text.as_bytes());
        let existing = {
            let key = key.clone();
            with_storage(state, move |s| s.get_file(&key)).await?
        };
        if detect_change(existing.as_ref(), &hash) == Change::Skip {
            tracing::debug!("[Indexer] Unchanged, skipping: {}", key);
            return Ok(false);
        }

        // 3. Chunking
        let chunks = chunk_text(&text, state.config.max_chunk_chars);
        tracing::debug!("[Indexer] {} split into {} chunks", key, chunks.len());

        // 4. Embeddings
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = state.embedder.embed_batch(&texts).await;

        let new_chunks: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewChunk {
                content: chunk.content,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                embedding: embedding.vector,
                embedding_state: embedding.state,
            })
            .collect();
        let chunk_count = new_chunks.len();

        // 5. Replace
        let file = NewFile {
            path: key.clone(),
            content_hash: hash,
            mtime,
            size,
            language: detect_language(path).to_string(),
            indexed_at: unix_secs(SystemTime::now()),
        };
        let file_id = with_storage(state, move |s| s.replace_file(&file, &new_chunks)).await?;

        tracing::info!("[Indexer] Indexed {} (ID: {}, {} chunks)", key, file_id, chunk_count);
        Ok(true)
    }

    /// Drop a file's record and everything hanging off it.
    ///
    /// A delete for a path that still exists on disk is treated as a change
    /// (atomic saves and renames often report the old name as removed).
    pub async fn remove_file(state: &SharedState, path: &Path) -> Result<bool> {
        let path = resolve_path(path)?;
        let key = path_key(&path);
        let _guard = state.lock_path(&key).await;

        if path.is_file() {
            tracing::debug!("[Indexer] Delete request for '{}' but file exists on disk. Re-indexing instead.", key);
            Self::index_locked(state, &path, key, None).await?;
            return Ok(false);
        }

        let removed = {
            let key = key.clone();
            with_storage(state, move |s| s.remove_file(&key)).await?
        };
        if removed {
            tracing::info!("[Indexer] Removed {}", key);
        }
        Ok(removed)
    }

    /// Scan `root` and run every candidate through the single-file pipeline.
    ///
    /// Per-file failures are logged and counted, never fatal.
    pub async fn index_repository(state: &SharedState, root: &Path, options: IndexOptions) -> Result<IndexReport> {
        let started = Instant::now();
        let root = resolve_path(root)?;
        if !root.is_dir() {
            return Err(IndexError::InvalidPath(format!("Not a directory: {}", root.display())));
        }

        let ignore = options.ignore_patterns.unwrap_or_else(|| state.config.ignore_patterns.clone());
        let extensions = options.extensions.unwrap_or_else(|| state.config.extensions.clone());
        let bouncer = Bouncer::new(&root, &ignore, &extensions)?;

        tracing::info!("[Indexer] Scanning {}", root.display());
        let candidates: Vec<PathBuf> = {
            let scanner = Scanner::new(bouncer.clone());
            tokio::task::spawn_blocking(move || scanner.scan().collect())
                .await
                .map_err(|_| IndexError::Other(anyhow::anyhow!("Scan task panic")))?
        };

        let mut report = IndexReport { total_files: candidates.len(), ..Default::default() };

        for path in &candidates {
            if options.cancel.as_ref().map_or(false, |c| c.is_cancelled()) {
                tracing::info!("[Indexer] Repository index cancelled");
                report.cancelled = true;
                break;
            }
            match Self::index_file(state, path, None).await {
                Ok(true) => report.indexed_files += 1,
                Ok(false) => report.skipped_files += 1,
                Err(e) => {
                    tracing::warn!("[Indexer] Failed to index {}: {}", path.display(), e);
                    report.failed_files += 1;
                }
            }
        }

        if options.prune_missing && !report.cancelled {
            report.removed_files = Self::purge_orphaned_records(state, &bouncer).await?;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "[Indexer] Done: {} files, {} indexed, {} skipped, {} failed, {} removed in {}ms",
            report.total_files, report.indexed_files, report.skipped_files,
            report.failed_files, report.removed_files, report.duration_ms
        );
        Ok(report)
    }

    /// Delete records under the bouncer's root whose file is gone or is no
    /// longer a candidate.
    async fn purge_orphaned_records(state: &SharedState, bouncer: &Bouncer) -> Result<usize> {
        let records = with_storage(state, |s| s.list_files()).await?;
        let mut removed = 0;

        for record in records {
            let path = PathBuf::from(&record.path);
            if !path.starts_with(bouncer.root()) {
                continue;
            }
            if path.is_file() && bouncer.is_candidate(&path) {
                continue;
            }

            let _guard = state.lock_path(&record.path).await;
            // A writer may have brought the file back while we waited
            if path.is_file() && bouncer.is_candidate(&path) {
                continue;
            }
            let key = record.path.clone();
            match with_storage(state, move |s| s.remove_file(&key)).await {
                Ok(true) => {
                    tracing::debug!("[Indexer] Purged orphan {}", record.path);
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("[Indexer] Failed to purge {}: {}", record.path, e),
            }
        }
        Ok(removed)
    }
}
