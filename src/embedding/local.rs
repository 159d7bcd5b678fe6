//! In-process embeddings with fastembed (ONNX)
//!
//! The model is loaded on the blocking pool and guarded by a mutex; every
//! call runs on the blocking pool too, since inference is CPU-bound.

use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// BAAI/bge-small-en-v1.5
pub const BGE_SMALL_DIM: usize = 384;

/// BGE's context is 512 tokens; roughly four chars per token
const MAX_INPUT_CHARS: usize = 2048;

pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedProvider {
    /// Load the default model, downloading it on first use
    pub async fn load() -> Result<Self> {
        tracing::info!("[Embedding] Initializing fastembed model...");
        let model = tokio::task::spawn_blocking(|| {
            TextEmbedding::try_new(InitOptions::new(EmbeddingModel::BGESmallENV15))
        })
        .await
        .map_err(|_| IndexError::Other(anyhow::anyhow!("Model init task panic")))?
        .map_err(|e| IndexError::Embedding(format!("Failed to initialize model: {}", e)))?;

        tracing::info!("[Embedding] fastembed model loaded");
        Ok(Self { model: Arc::new(Mutex::new(model)) })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| IndexError::Embedding("Poisoned model lock".into()))?;
            model
                .embed(texts, None)
                .map_err(|e| IndexError::Embedding(format!("Failed to embed: {}", e)))
        })
        .await
        .map_err(|_| IndexError::Other(anyhow::anyhow!("Embed task panic")))?
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    fn name(&self) -> &str {
        "fastembed"
    }

    fn dimension(&self) -> usize {
        BGE_SMALL_DIM
    }

    fn max_input_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.run(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| IndexError::Embedding("Model returned no vector".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }
}
