//! Embedding providers.
//!
//! The builder and the query path only see the `EmbeddingProvider` trait;
//! the concrete provider is chosen from configuration.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
