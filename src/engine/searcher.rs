// FILE: src/engine/searcher.rs
use crate::engine::with_storage;
use crate::error::Result;
use crate::state::{EmbeddingState, SearchResult, SharedState};
use crate::storage::ChunkRecord;

pub struct Searcher;

impl Searcher {
    /// Embed `query` and rank every stored chunk against it.
    ///
    /// Brute force over all chunks. At most `top_k` results, best first.
    pub async fn search(state: &SharedState, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        // 1. Generate Embedding
        let query_embedding = state.embedder.embed(query).await;
        if query_embedding.state == EmbeddingState::Fallback {
            tracing::warn!("[Searcher] Query embedding fell back to zero vector; all scores will be 0");
        }

        // 2. Scan + score (Blocking)
        let vector = query_embedding.vector;
        let results = with_storage(state, move |s| {
            let chunks = s.all_chunks()?;
            Ok(rank(&vector, chunks, top_k))
        })
        .await?;

        tracing::info!("[Searcher] Completed search for '{}' ({} results)", query, results.len());
        Ok(results)
    }
}

/// Score, sort descending and keep the best `top_k`.
pub fn rank(query: &[f32], chunks: Vec<ChunkRecord>, top_k: usize) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = chunks
        .into_iter()
        // Undecodable blobs come back empty
        .filter(|chunk| !chunk.embedding.is_empty())
        .map(|chunk| SearchResult {
            score: cosine_similarity(query, &chunk.embedding),
            path: chunk.path,
            content: chunk.content,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            embedding_state: chunk.embedding_state,
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}

/// Cosine similarity in [-1, 1].
///
/// Zero when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}
