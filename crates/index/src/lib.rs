//! Attachment index maintenance for Courier.
//!
//! Keeps a searchable embedding index of the attachments directory in step
//! with its contents: the directory is watched, every relevant change
//! triggers a full rebuild, and the rebuilt snapshot replaces the previous
//! one atomically. Rebuilds and snapshot reads are serialized through a
//! single lease, so queries never observe a half-written index.
//!
//! # Example
//! ```no_run
//! use courier_core::AppConfig;
//! use courier_index::IndexManager;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let manager = Arc::new(IndexManager::from_app_config(&config)?);
//!
//! manager.build_index().await;
//! manager.start_file_monitor()?;
//!
//! let context = manager.query_documents("When is the invoice due?", 3).await;
//! println!("{}", context);
//! # Ok(())
//! # }
//! ```

pub mod answer;
pub mod builder;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod guard;
pub mod loader;
pub mod manager;
pub mod parser;
pub mod query;
pub mod snapshot;
pub mod trigger;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use answer::{AnswerGenerator, LlmAnswerGenerator};
pub use config::{FileFilter, IndexConfig};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use guard::{IndexGuard, IndexLease};
pub use manager::IndexManager;
pub use query::{QueryEngine, INDEX_ABSENT_MESSAGE};
pub use snapshot::{IndexSnapshot, SnapshotStore};
pub use trigger::{DebouncedTrigger, ImmediateTrigger, RebuildTrigger, Rebuilder};
pub use types::{BuildReport, BuildStatus, Hit, IndexStatus, Retrieval};
pub use watcher::{DirectoryWatcher, WatchEvent};
