//! Index maintenance configuration.
//!
//! `IndexConfig` is derived from the application config with every
//! directory already resolved against the workspace.

use crate::embeddings::EmbeddingConfig;
use courier_core::{AppConfig, AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Snapshot file name inside the persist directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Lock file shared by every process using the same persist directory.
pub const LOCK_FILE: &str = ".lock";

/// Settings consumed by the builder, watcher and query path.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Watched attachments directory
    pub source_dir: PathBuf,

    /// Directory holding `snapshot.json`
    pub persist_dir: PathBuf,

    pub filter: FileFilter,

    /// Descend into subdirectories when loading
    pub recursive: bool,

    pub chunk_size: usize,
    pub chunk_overlap: usize,

    /// Default `k` for queries
    pub top_k: usize,

    /// Coalescing window for watcher events (`None` = immediate rebuilds)
    pub debounce: Option<Duration>,

    pub embedding: EmbeddingConfig,
}

impl IndexConfig {
    /// Build from the application config, validating as we go.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let index = &config.index;
        let result = Self {
            source_dir: config.source_dir(),
            persist_dir: config.persist_dir(),
            filter: FileFilter::new(index.extensions.clone()),
            recursive: index.recursive,
            chunk_size: index.chunk_size,
            chunk_overlap: index.chunk_overlap,
            top_k: index.top_k,
            debounce: index.debounce_ms.map(Duration::from_millis),
            embedding: EmbeddingConfig::from_section(&config.embedding),
        };

        result.validate()?;
        Ok(result)
    }

    /// Config rooted at `source_dir`/`persist_dir` with default settings.
    pub fn new(source_dir: impl Into<PathBuf>, persist_dir: impl Into<PathBuf>) -> Self {
        let defaults = AppConfig::default();
        let index = &defaults.index;

        Self {
            source_dir: source_dir.into(),
            persist_dir: persist_dir.into(),
            filter: FileFilter::default(),
            recursive: index.recursive,
            chunk_size: index.chunk_size,
            chunk_overlap: index.chunk_overlap,
            top_k: index.top_k,
            debounce: None,
            embedding: EmbeddingConfig::from_section(&defaults.embedding),
        }
    }

    /// Check chunking and query parameters.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be positive".to_string()));
        }

        if self.filter.extensions().is_empty() {
            return Err(AppError::Config(
                "At least one document extension is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the current snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.persist_dir.join(SNAPSHOT_FILE)
    }
}

/// Decides which paths count as documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    extensions: Vec<String>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(vec!["pdf".to_string(), "txt".to_string(), "md".to_string()])
    }
}

impl FileFilter {
    /// Extensions are matched without the leading dot, case-insensitively.
    pub fn new(extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `path` names a document this subsystem indexes.
    ///
    /// Hidden files and editor/download temp files never match.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if is_ignored_name(name) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.')
        || name.starts_with("~$")
        || name.ends_with('~')
        || name.ends_with(".tmp")
        || name.ends_with(".part")
        || name.ends_with(".crdownload")
}
