//! Embedding client
//!
//! Wraps an `EmbeddingProvider` with the policies the index relies on:
//! input truncation, batching, a pause between calls, per-call timeout,
//! retry with exponential backoff and, as a last resort, an all-zero vector
//! tagged `EmbeddingState::Fallback`. A zero vector has cosine 0 against any
//! query, so unembeddable chunks sink to the bottom of results instead of
//! blocking indexing.

#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod ollama;

use crate::config::EmbeddingConfig;
use crate::error::{IndexError, Result};
use crate::state::EmbeddingState;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "local-embeddings")]
pub use self::local::FastEmbedProvider;
pub use self::ollama::OllamaProvider;

/// Source of embedding vectors (local model, HTTP service, test double)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Longest input, in chars, the provider accepts
    fn max_input_chars(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// A vector plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub state: EmbeddingState,
}

impl Embedding {
    pub fn fallback(dimension: usize) -> Self {
        Self { vector: vec![0.0; dimension], state: EmbeddingState::Fallback }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub batch_size: usize,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    /// Caps the provider's own limit
    pub max_input_chars: usize,
}

impl From<&EmbeddingConfig> for ClientSettings {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
            max_input_chars: config.max_input_chars,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&EmbeddingConfig::default())
    }
}

pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    settings: ClientSettings,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, settings: ClientSettings) -> Self {
        Self { provider, settings }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed one text. Never fails; see the module docs.
    pub async fn embed(&self, text: &str) -> Embedding {
        let input = self.truncate(text);
        match self.with_retry(|| self.provider.embed(&input)).await {
            Ok(vector) if vector.len() == self.dimension() => {
                Embedding { vector, state: EmbeddingState::Embedded }
            }
            Ok(vector) => {
                tracing::warn!(
                    "[Embedding] {} returned {} dims, expected {}; using zero vector",
                    self.provider.name(), vector.len(), self.dimension()
                );
                Embedding::fallback(self.dimension())
            }
            Err(e) => {
                tracing::warn!("[Embedding] Falling back to zero vector: {}", e);
                Embedding::fallback(self.dimension())
            }
        }
    }

    /// Embed texts in order, one result per input.
    ///
    /// Batches go out sequentially with `request_delay` between calls. A batch
    /// that still fails after its retries is redone text by text so only the
    /// bad inputs fall back.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Embedding> {
        let mut out = Vec::with_capacity(texts.len());
        let mut first_call = true;

        for batch in texts.chunks(self.settings.batch_size) {
            if !first_call && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            first_call = false;

            let inputs: Vec<String> = batch.iter().map(|t| self.truncate(t)).collect();
            let result = self.with_retry(|| self.provider.embed_batch(&inputs)).await;

            match result {
                Ok(vectors) if self.batch_is_valid(&vectors, inputs.len()) => {
                    out.extend(vectors.into_iter().map(|vector| Embedding {
                        vector,
                        state: EmbeddingState::Embedded,
                    }));
                }
                outcome => {
                    if let Err(e) = outcome {
                        tracing::warn!("[Embedding] Batch of {} failed ({}); retrying one by one", inputs.len(), e);
                    } else {
                        tracing::warn!("[Embedding] Batch of {} returned malformed vectors; retrying one by one", inputs.len());
                    }
                    for (i, input) in inputs.iter().enumerate() {
                        if i > 0 && !self.settings.request_delay.is_zero() {
                            tokio::time::sleep(self.settings.request_delay).await;
                        }
                        out.push(self.embed(input).await);
                    }
                }
            }
        }

        let fallbacks = out.iter().filter(|e| e.state == EmbeddingState::Fallback).count();
        if fallbacks > 0 {
            tracing::warn!("[Embedding] {}/{} texts fell back to zero vectors", fallbacks, out.len());
        }
        out
    }

    fn batch_is_valid(&self, vectors: &[Vec<f32>], expected: usize) -> bool {
        vectors.len() == expected && vectors.iter().all(|v| v.len() == self.dimension())
    }

    fn truncate(&self, text: &str) -> String {
        let limit = self.settings.max_input_chars.min(self.provider.max_input_chars());
        truncate_chars(text, limit).to_string()
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = self.settings.backoff;
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(self.settings.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(IndexError::Embedding(format!(
                    "{} timed out after {:?}",
                    self.provider.name(),
                    self.settings.timeout
                ))),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "[Embedding] Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.settings.max_retries + 1, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Longest prefix of `text` with at most `max_chars` chars
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
