#![allow(dead_code)]

use async_trait::async_trait;
use semindex::{
    EmbeddingConfig, EmbeddingProvider, FileEvent, IndexEngine, IndexError, IndexerConfig, MemoryStorage,
    Result, Storage, Watcher,
};
use semindex::core::Bouncer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const DIM: usize = 32;

/// Deterministic bag-of-words vectors: each lowercase word bumps one slot.
pub struct BagOfWords;

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hash: u32 = 2166136261;
        for byte in word.to_lowercase().bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(16777619);
        }
        vector[hash as usize % DIM] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for BagOfWords {
    fn name(&self) -> &str { "bag-of-words" }
    fn dimension(&self) -> usize { DIM }
    fn max_input_chars(&self) -> usize { 10_000 }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(bag_of_words(text))
    }
}

/// Provider that is always down
pub struct Unreachable;

#[async_trait]
impl EmbeddingProvider for Unreachable {
    fn name(&self) -> &str { "unreachable" }
    fn dimension(&self) -> usize { DIM }
    fn max_input_chars(&self) -> usize { 10_000 }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(IndexError::Embedding("connection refused".into()))
    }
}

/// Bag-of-words that parks every call until the test hands out a permit.
/// `entered` fires only for calls that had to wait.
pub struct Gated {
    pub entered: tokio::sync::Notify,
    pub permits: tokio::sync::Semaphore,
}

impl Gated {
    pub fn new() -> Self {
        Self { entered: tokio::sync::Notify::new(), permits: tokio::sync::Semaphore::new(0) }
    }

    pub fn release(&self, calls: usize) {
        self.permits.add_permits(calls);
    }
}

#[async_trait]
impl EmbeddingProvider for Gated {
    fn name(&self) -> &str { "gated" }
    fn dimension(&self) -> usize { DIM }
    fn max_input_chars(&self) -> usize { 10_000 }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(permit) = self.permits.try_acquire() {
            permit.forget();
            return Ok(bag_of_words(text));
        }
        self.entered.notify_one();
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;
        permit.forget();
        Ok(bag_of_words(text))
    }
}

/// Bag-of-words with a pause per call, so concurrent writers interleave
pub struct Sluggish(pub Duration);

#[async_trait]
impl EmbeddingProvider for Sluggish {
    fn name(&self) -> &str { "sluggish" }
    fn dimension(&self) -> usize { DIM }
    fn max_input_chars(&self) -> usize { 10_000 }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.0).await;
        Ok(bag_of_words(text))
    }
}

/// Watcher driven by the test: events go wherever `send` puts them.
#[derive(Clone, Default)]
pub struct ManualWatcher {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<FileEvent>>>>,
}

impl ManualWatcher {
    pub fn send(&self, event: FileEvent) {
        let sender = self.sender.lock().unwrap();
        sender.as_ref().expect("not watching").send(event).unwrap();
    }

    pub fn is_watching(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }
}

impl Watcher for ManualWatcher {
    fn watch(&mut self, _bouncer: Bouncer, events: mpsc::UnboundedSender<FileEvent>) -> Result<()> {
        *self.sender.lock().unwrap() = Some(events);
        Ok(())
    }

    fn unwatch(&mut self) -> Result<()> {
        self.sender.lock().unwrap().take();
        Ok(())
    }
}

pub fn test_config(db_path: &Path) -> IndexerConfig {
    IndexerConfig {
        db_path: db_path.to_path_buf(),
        embedding: EmbeddingConfig {
            provider: "test".into(),
            dimension: DIM,
            request_delay_ms: 0,
            max_retries: 1,
            backoff_ms: 1,
            ..EmbeddingConfig::default()
        },
        ..IndexerConfig::default()
    }
}

pub fn engine_with(
    storage: Arc<dyn Storage>,
    provider: Arc<dyn EmbeddingProvider>,
    watcher: Box<dyn Watcher>,
    db_dir: &Path,
) -> IndexEngine {
    IndexEngine::new(storage, provider, watcher, test_config(&db_dir.join("index.db"))).unwrap()
}

pub fn memory_engine(dir: &Path) -> IndexEngine {
    engine_with(
        Arc::new(MemoryStorage::new()),
        Arc::new(BagOfWords),
        Box::new(ManualWatcher::default()),
        dir,
    )
}

/// Canonical temp root, so stored paths compare equal to ours
pub fn canonical_root(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().canonicalize().unwrap()
}

pub fn numbered_lines(prefix: &str, count: usize) -> String {
    (1..=count).map(|i| format!("let {}{} = {};\n", prefix, i, i)).collect()
}
