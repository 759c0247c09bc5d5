//! Persisted index snapshots.
//!
//! A snapshot is written to a uniquely named temp file in the persist
//! directory, synced, then renamed over `snapshot.json`. Readers either see
//! the previous complete snapshot or the new complete one.

use crate::config::SNAPSHOT_FILE;
use crate::embeddings::EmbeddingProvider;
use crate::types::{Hit, IndexedChunk, SnapshotSummary, SourceRecord};
use chrono::{DateTime, Utc};
use courier_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const TEMP_PREFIX: &str = "snapshot.";
const TEMP_SUFFIX: &str = ".tmp";

/// One complete, immutable index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub documents: Vec<SourceRecord>,
    pub entries: Vec<IndexedChunk>,
}

impl IndexSnapshot {
    /// Exact cosine search over every entry.
    ///
    /// Results are ordered by descending score; equal scores keep snapshot
    /// order (document path, then chunk position).
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(&IndexedChunk, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(entry, score)| Hit {
                source: entry.chunk.source.clone(),
                position: entry.chunk.position,
                score,
                text: entry.chunk.text.clone(),
            })
            .collect()
    }

    /// Whether vectors from `provider` live in the same space as this
    /// snapshot's embeddings.
    pub fn is_searchable_with(&self, provider: &dyn EmbeddingProvider) -> bool {
        self.provider == provider.provider_name()
            && self.model == provider.model_name()
            && self.dimensions == provider.dimensions()
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            version: self.version,
            built_at: self.built_at,
            provider: self.provider.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            documents: self.documents.clone(),
            chunk_count: self.entries.len(),
        }
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Non-finite inputs score 0.0 so search results always have a total order.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Reads and writes the snapshot file in one persist directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Version of the persisted snapshot without materializing its entries.
    pub fn current_version(&self) -> AppResult<Option<u64>> {
        #[derive(Deserialize)]
        struct Header {
            version: u64,
        }

        let path = self.path();
        if !path.is_file() {
            return Ok(None);
        }

        let file = File::open(&path)
            .map_err(|e| AppError::Index(format!("Failed to open snapshot {:?}: {}", path, e)))?;
        let header: Header = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AppError::Index(format!("Corrupt snapshot {:?}: {}", path, e)))?;

        Ok(Some(header.version))
    }

    /// Load the current snapshot, or `None` if nothing was ever persisted.
    pub fn load(&self) -> AppResult<Option<IndexSnapshot>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read(&path)
            .map_err(|e| AppError::Index(format!("Failed to read snapshot {:?}: {}", path, e)))?;

        let snapshot: IndexSnapshot = serde_json::from_slice(&contents)
            .map_err(|e| AppError::Index(format!("Corrupt snapshot {:?}: {}", path, e)))?;

        Ok(Some(snapshot))
    }

    /// Atomically replace the current snapshot.
    ///
    /// On failure the temp file is removed and the previous snapshot is
    /// left as it was. After a successful swap, temp files last modified
    /// before `stale_before` (the caller's lease acquisition) are removed.
    pub fn persist(&self, snapshot: &IndexSnapshot, stale_before: SystemTime) -> AppResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to create persist directory {:?}: {}",
                self.dir, e
            ))
        })?;

        let temp_path = self.dir.join(format!(
            "{}{}{}",
            TEMP_PREFIX,
            uuid::Uuid::new_v4(),
            TEMP_SUFFIX
        ));

        if let Err(e) = self.write_and_swap(snapshot, &temp_path) {
            if temp_path.exists() {
                if let Err(remove_err) = fs::remove_file(&temp_path) {
                    tracing::warn!("Failed to remove temp file {:?}: {}", temp_path, remove_err);
                }
            }
            return Err(e);
        }

        self.remove_stale_temp_files(stale_before);

        tracing::debug!(
            "Persisted snapshot v{} ({} entries) to {:?}",
            snapshot.version,
            snapshot.entries.len(),
            self.path()
        );
        Ok(())
    }

    fn write_and_swap(&self, snapshot: &IndexSnapshot, temp_path: &Path) -> AppResult<()> {
        let persistence = |what: &str, e: &dyn std::fmt::Display| {
            AppError::Persistence(format!("Failed to {} {:?}: {}", what, temp_path, e))
        };

        let file = File::create(temp_path).map_err(|e| persistence("create", &e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot).map_err(|e| persistence("serialize", &e))?;
        writer.flush().map_err(|e| persistence("write", &e))?;

        let file = writer
            .into_inner()
            .map_err(|e| persistence("write", &e.error().to_string()))?;
        file.sync_all().map_err(|e| persistence("sync", &e))?;
        drop(file);

        let target = self.path();
        fs::rename(temp_path, &target).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to move {:?} over {:?}: {}",
                temp_path, target, e
            ))
        })?;

        // Make the rename itself durable where the platform allows it
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    /// Remove temp files left behind by an abandoned rebuild.
    fn remove_stale_temp_files(&self, stale_before: SystemTime) {
        for path in self.temp_files() {
            let modified = fs::metadata(&path).and_then(|m| m.modified());
            if !matches!(modified, Ok(at) if at < stale_before) {
                tracing::debug!("Keeping recent temp file {:?}", path);
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed stale temp file {:?}", path),
                Err(e) => tracing::warn!("Failed to remove stale temp file {:?}: {}", path, e),
            }
        }
    }

    /// Temp files currently present in the persist directory.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(TEMP_SUFFIX))
                        .unwrap_or(false)
            })
            .collect()
    }
}
