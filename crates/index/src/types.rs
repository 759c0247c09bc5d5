//! Index maintenance type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Raw attachment content read from the watched directory.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path of the attachment; identity of the document
    pub path: PathBuf,

    /// Detected content type ("pdf", "text", ...)
    pub content_type: String,

    /// Extracted text
    pub text: String,

    /// Size of the file on disk
    pub size_bytes: u64,

    /// Hex SHA-256 of the file bytes
    pub sha256: String,
}

/// Contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document path
    pub source: PathBuf,

    /// Position within the source (0-based)
    pub position: u32,

    /// Chunk text
    pub text: String,

    /// Start offset in characters
    pub start: usize,

    /// End offset in characters (exclusive)
    pub end: usize,
}

/// A chunk paired with its embedding, as stored in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,

    pub embedding: Vec<f32>,
}

/// Per-document provenance recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub path: PathBuf,
    pub content_type: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub chunk_count: u32,
}

/// Outcome of a single rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// A new snapshot was persisted and is now current
    Built,
    /// No documents were found; the previous snapshot stays current
    SkippedEmpty,
    /// The rebuild failed; the previous snapshot stays current
    Failed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Built => "built",
            Self::SkippedEmpty => "skipped_empty",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Report returned by `build_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub status: BuildStatus,

    /// Documents found in the watched directory
    pub document_count: u32,

    /// Chunks embedded into the snapshot (0 unless built)
    pub chunk_count: u32,

    /// Version of the snapshot that is current after this build
    pub version: u64,

    pub duration_secs: f64,

    /// Failure description when `status` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildReport {
    pub(crate) fn failed(version: u64, duration_secs: f64, error: String) -> Self {
        Self {
            status: BuildStatus::Failed,
            document_count: 0,
            chunk_count: 0,
            version,
            duration_secs,
            error: Some(error),
        }
    }
}

/// One retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub source: PathBuf,
    pub position: u32,
    pub score: f32,
    pub text: String,
}

/// Result of retrieving the nearest chunks for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    /// Snapshot version the hits came from
    pub version: u64,

    /// Hits ordered by descending score
    pub hits: Vec<Hit>,
}

impl Retrieval {
    /// Concatenate hit texts into the context handed to answer generation.
    pub fn context(&self) -> String {
        self.hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Summary of the persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub documents: Vec<SourceRecord>,
    pub chunk_count: usize,
}

/// Current state of an index manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Version mirrored in memory (0 = nothing built yet)
    pub version: u64,

    /// Whether the directory monitor is running
    pub watching: bool,

    pub source_dir: PathBuf,
    pub persist_dir: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotSummary>,
}
