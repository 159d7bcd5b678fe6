//! Ollama embeddings over HTTP
//!
//! Uses `POST /api/embed`, which takes a batch of inputs in one request.

use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default Ollama server URL
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    /// Let the server cut over-long inputs instead of failing them
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaProvider {
    base_url: String,
    model: String,
    dimension: usize,
    max_input_chars: usize,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, dimension: usize, max_input_chars: usize) -> Result<Self> {
        // Per-call timeouts are enforced by the embedding client
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| IndexError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            max_input_chars,
            client,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest { model: &self.model, input, truncate: true };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Embedding(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexError::Embedding(format!("Ollama returned {}: {}", status, text)));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Embedding(format!("Invalid Ollama response: {}", e)))?;

        if parsed.embeddings.len() != input.len() {
            return Err(IndexError::Embedding(format!(
                "Ollama returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                input.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| IndexError::Embedding("Ollama returned no vector".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
