//! Shared fixtures for index integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use courier_core::{AppError, AppResult};
use courier_index::embeddings::providers::TrigramProvider;
use courier_index::{EmbeddingProvider, IndexConfig, IndexManager};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const DIMENSIONS: usize = 64;

/// Workspace with an attachments directory and an index directory.
pub struct Fixture {
    pub temp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("attachments")).unwrap();
        Self { temp }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.temp.path().join("attachments")
    }

    pub fn persist_dir(&self) -> PathBuf {
        self.temp.path().join("index")
    }

    pub fn config(&self) -> IndexConfig {
        IndexConfig::new(self.source_dir(), self.persist_dir())
    }

    pub fn manager(&self, provider: Arc<dyn EmbeddingProvider>) -> IndexManager {
        IndexManager::new(self.config(), provider).unwrap()
    }

    pub fn trigram_manager(&self) -> IndexManager {
        self.manager(Arc::new(TrigramProvider::new(DIMENSIONS)))
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.source_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Write under a hidden name, then rename into place.
    pub fn drop_in(&self, name: &str, contents: &str) -> PathBuf {
        let staging = self.source_dir().join(format!(".{}.incoming", name));
        fs::write(&staging, contents).unwrap();
        let path = self.source_dir().join(name);
        fs::rename(&staging, &path).unwrap();
        path
    }
}

/// Trigram provider that sleeps inside every batch and records how many
/// batches overlap.
#[derive(Debug)]
pub struct SlowProvider {
    inner: TrigramProvider,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: TrigramProvider::new(DIMENSIONS),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = self.inner.embed_batch(texts).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        // Query embeddings run outside the lease and are not counted
        self.inner.embed(text).await
    }
}

/// Trigram provider that fails while `failing` is set.
#[derive(Debug)]
pub struct ToggleProvider {
    inner: TrigramProvider,
    pub failing: AtomicBool,
}

impl ToggleProvider {
    pub fn new() -> Self {
        Self {
            inner: TrigramProvider::new(DIMENSIONS),
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ToggleProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Embedding("embedding service unavailable".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

pub fn temp_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
                .collect()
        })
        .unwrap_or_default()
}
