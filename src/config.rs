//! Configuration for the index engine
//!
//! Loaded from `config.toml` under the user's config directory, or an explicit
//! path. Missing files fall back to defaults; a few env vars override on top.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "semindex";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// SQLite file holding the index
    pub db_path: PathBuf,
    /// Soft ceiling for chunk size, in characters
    pub max_chunk_chars: usize,
    /// Extension allowlist (no leading dot, case-insensitive)
    pub extensions: Vec<String>,
    /// Substrings or glob wildcards; matching directories are pruned
    pub ignore_patterns: Vec<String>,
    pub default_top_k: usize,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `fastembed` or `ollama`
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub dimension: usize,
    pub max_input_chars: usize,
    pub batch_size: usize,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_chunk_chars: 1000,
            extensions: [
                "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "c", "h", "cpp", "hpp",
                "cs", "rb", "php", "swift", "sh", "md", "txt", "json", "yaml", "yml", "toml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignore_patterns: [
                ".git", "node_modules", "target", "dist", "build", "__pycache__", "*.min.js",
                "*.lock",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_top_k: 10,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "fastembed".to_string(),
            model: "BAAI/bge-small-en-v1.5".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            dimension: 384,
            max_input_chars: 8000,
            batch_size: 16,
            request_delay_ms: 100,
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 250,
        }
    }
}

/// `<local data dir>/semindex/index.db`, or the temp dir if no home is known.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("index.db")
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

impl IndexerConfig {
    /// Load configuration from `custom_path` or the default location.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(custom_path: Option<&Path>) -> Result<Self> {
        let mut config = match custom_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
            .map_err(|e| IndexError::Config(format!("{} ({})", e, path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IndexError::Config(format!("Invalid config: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("SEMINDEX_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(provider) = std::env::var("SEMINDEX_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(endpoint) = std::env::var("SEMINDEX_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(IndexError::Config("max_chunk_chars must be > 0".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(IndexError::Config("embedding.dimension must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(IndexError::Config("embedding.batch_size must be > 0".into()));
        }
        Ok(())
    }
}
