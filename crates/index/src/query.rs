//! Query path: read the current snapshot under the lease, then search it.

use crate::embeddings::EmbeddingProvider;
use crate::guard::IndexGuard;
use crate::snapshot::SnapshotStore;
use crate::types::Retrieval;
use courier_core::{AppError, AppResult};
use std::sync::Arc;

/// Returned verbatim by `query_documents` when nothing has been built yet.
pub const INDEX_ABSENT_MESSAGE: &str =
    "ERROR: no index present. Build the index before querying.";

/// Retrieves the chunks nearest to a query.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    guard: IndexGuard,
    store: SnapshotStore,
    provider: Arc<dyn EmbeddingProvider>,
}

impl QueryEngine {
    pub fn new(guard: IndexGuard, store: SnapshotStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            guard,
            store,
            provider,
        }
    }

    /// Top-`k` chunks for `query` from the current snapshot.
    ///
    /// The lease is held only while the snapshot file is read; embedding the
    /// query and scoring happen after it is released.
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<Retrieval> {
        let snapshot = {
            let _lease = self.guard.acquire("query").await?;
            let store = self.store.clone();
            tokio::task::spawn_blocking(move || store.load())
                .await
                .map_err(|e| AppError::Index(format!("Snapshot read task failed: {}", e)))??
        };

        let snapshot = snapshot.ok_or(AppError::IndexAbsent)?;

        if k == 0 {
            return Ok(Retrieval {
                version: snapshot.version,
                hits: Vec::new(),
            });
        }

        if !snapshot.is_searchable_with(self.provider.as_ref()) {
            return Err(AppError::Index(format!(
                "Snapshot v{} was built with {}/{} ({} dims) but queries use {}/{} ({} dims); rebuild the index",
                snapshot.version,
                snapshot.provider,
                snapshot.model,
                snapshot.dimensions,
                self.provider.provider_name(),
                self.provider.model_name(),
                self.provider.dimensions()
            )));
        }

        let query_embedding = self.provider.embed(query).await?;
        let hits = snapshot.search(&query_embedding, k);

        tracing::debug!(
            version = snapshot.version,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score).unwrap_or(0.0),
            "Retrieved chunks (requested top-{})",
            k
        );

        Ok(Retrieval {
            version: snapshot.version,
            hits,
        })
    }
}

/// Human-readable text for a failed query.
pub fn describe_failure(err: &AppError) -> String {
    match err {
        AppError::IndexAbsent => INDEX_ABSENT_MESSAGE.to_string(),
        other => format!("ERROR: query failed: {}", other),
    }
}
