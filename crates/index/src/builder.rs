//! Embedding index builder.
//!
//! Turns the current contents of the watched directory into a new
//! snapshot: load, chunk, embed, persist.

use crate::chunker;
use crate::config::IndexConfig;
use crate::embeddings::EmbeddingProvider;
use crate::guard::IndexLease;
use crate::loader::DirectoryLoader;
use crate::snapshot::{IndexSnapshot, SnapshotStore};
use crate::types::{BuildReport, BuildStatus, Chunk, Document, IndexedChunk, SourceRecord};
use chrono::Utc;
use courier_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Instant;

/// Builds snapshots from the watched directory.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    config: IndexConfig,
    provider: Arc<dyn EmbeddingProvider>,
    store: SnapshotStore,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let store = SnapshotStore::new(config.persist_dir.clone());
        Self {
            config,
            provider,
            store,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one full rebuild.
    ///
    /// Requires the index lease. `current_version` is the version of the
    /// snapshot that is current now; a successful build persists
    /// `current_version + 1`. Any error leaves the current snapshot intact.
    pub async fn build(&self, lease: &IndexLease, current_version: u64) -> AppResult<BuildReport> {
        let start = Instant::now();

        let documents = self.load_documents().await?;
        let document_count = documents.len() as u32;

        if documents.is_empty() {
            tracing::info!(
                "No documents in {:?}; keeping snapshot v{}",
                self.config.source_dir,
                current_version
            );
            return Ok(skipped(0, current_version, start));
        }

        let (records, chunks) = self.chunk_documents(&documents)?;
        if chunks.is_empty() {
            tracing::info!(
                "{} documents contained no text; keeping snapshot v{}",
                document_count,
                current_version
            );
            return Ok(skipped(document_count, current_version, start));
        }

        tracing::info!(
            "Embedding {} chunks from {} documents using provider '{}' (model: {})",
            chunks.len(),
            document_count,
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let entries = self.embed_chunks(chunks).await?;
        let chunk_count = entries.len() as u32;
        let version = current_version + 1;

        let snapshot = IndexSnapshot {
            version,
            built_at: Utc::now(),
            provider: self.provider.provider_name().to_string(),
            model: self.provider.model_name().to_string(),
            dimensions: self.provider.dimensions(),
            documents: records,
            entries,
        };

        let store = self.store.clone();
        let stale_before = lease.acquired_at();
        tokio::task::spawn_blocking(move || store.persist(&snapshot, stale_before))
            .await
            .map_err(|e| AppError::Persistence(format!("Persist task failed: {}", e)))??;

        Ok(BuildReport {
            status: BuildStatus::Built,
            document_count,
            chunk_count,
            version,
            duration_secs: start.elapsed().as_secs_f64(),
            error: None,
        })
    }

    async fn load_documents(&self) -> AppResult<Vec<Document>> {
        let loader = DirectoryLoader::new(self.config.source_dir.clone(), self.config.filter.clone())
            .recursive(self.config.recursive);

        tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| AppError::Index(format!("Loader task failed: {}", e)))?
    }

    fn chunk_documents(&self, documents: &[Document]) -> AppResult<(Vec<SourceRecord>, Vec<Chunk>)> {
        let mut records = Vec::with_capacity(documents.len());
        let mut chunks = Vec::new();

        for document in documents {
            let doc_chunks = chunker::chunk_text(
                &document.path,
                &document.text,
                self.config.chunk_size,
                self.config.chunk_overlap,
            )?;

            records.push(SourceRecord {
                path: document.path.clone(),
                content_type: document.content_type.clone(),
                size_bytes: document.size_bytes,
                sha256: document.sha256.clone(),
                chunk_count: doc_chunks.len() as u32,
            });
            chunks.extend(doc_chunks);
        }

        Ok((records, chunks))
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> AppResult<Vec<IndexedChunk>> {
        let dimensions = self.provider.dimensions();
        let batch_size = self.config.embedding.batch_size.max(1);
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.provider.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} embeddings for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != dimensions {
                    return Err(AppError::Embedding(format!(
                        "Embedding for {:?}#{} has {} dimensions, expected {}",
                        chunk.source,
                        chunk.position,
                        embedding.len(),
                        dimensions
                    )));
                }

                if embedding.iter().any(|v| !v.is_finite()) {
                    return Err(AppError::Embedding(format!(
                        "Embedding for {:?}#{} contains non-finite values",
                        chunk.source, chunk.position
                    )));
                }

                entries.push(IndexedChunk {
                    chunk: chunk.clone(),
                    embedding,
                });
            }

            tracing::debug!("Embedded {}/{} chunks", entries.len(), chunks.len());
        }

        Ok(entries)
    }
}

fn skipped(document_count: u32, version: u64, start: Instant) -> BuildReport {
    BuildReport {
        status: BuildStatus::SkippedEmpty,
        document_count,
        chunk_count: 0,
        version,
        duration_secs: start.elapsed().as_secs_f64(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::guard::IndexGuard;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct ShortProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn provider_name(&self) -> &str {
            "short"
        }

        fn model_name(&self) -> &str {
            "short-v1"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn builder(temp: &TempDir, provider: Arc<dyn EmbeddingProvider>) -> IndexBuilder {
        let mut config = IndexConfig::new(temp.path().join("attachments"), temp.path().join("index"));
        config.chunk_size = 100;
        config.chunk_overlap = 10;
        config.embedding.batch_size = 2;
        IndexBuilder::new(config, provider)
    }

    #[tokio::test]
    async fn test_build_persists_next_version() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("attachments");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), "x".repeat(250)).unwrap();
        fs::write(source.join("b.md"), "# Notes\nshort").unwrap();

        let builder = builder(&temp, Arc::new(TrigramProvider::new(16)));
        let guard = IndexGuard::new(temp.path().join("index"));
        let lease = guard.acquire("build").await.unwrap();

        let report = builder.build(&lease, 4).await.unwrap();
        assert_eq!(report.status, BuildStatus::Built);
        assert_eq!(report.document_count, 2);
        assert_eq!(report.chunk_count, 4);
        assert_eq!(report.version, 5);

        let snapshot = builder.store().load().unwrap().unwrap();
        assert_eq!(snapshot.version, 5);
        assert_eq!(snapshot.documents[0].chunk_count, 3);
        assert_eq!(snapshot.documents[1].chunk_count, 1);
        assert_eq!(snapshot.dimensions, 16);
    }

    #[tokio::test]
    async fn test_empty_directory_is_skipped() {
        let temp = TempDir::new().unwrap();
        let builder = builder(&temp, Arc::new(TrigramProvider::new(16)));
        let guard = IndexGuard::new(temp.path().join("index"));
        let lease = guard.acquire("build").await.unwrap();

        let report = builder.build(&lease, 2).await.unwrap();
        assert_eq!(report.status, BuildStatus::SkippedEmpty);
        assert_eq!(report.version, 2);
        assert!(!builder.store().exists());
    }

    #[tokio::test]
    async fn test_wrong_dimensions_fail_without_persisting() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("attachments");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), "contract text").unwrap();

        let builder = builder(&temp, Arc::new(ShortProvider));
        let guard = IndexGuard::new(temp.path().join("index"));
        let lease = guard.acquire("build").await.unwrap();

        let result = builder.build(&lease, 0).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
        assert!(!builder.store().exists());
    }
}
