//! Embedding configuration.

use courier_core::config::EmbeddingSection;
use serde::{Deserialize, Serialize};

/// Settings handed to `create_provider`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Texts per `embed_batch` call during a rebuild
    pub batch_size: usize,

    /// Endpoint for HTTP providers
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_section(&EmbeddingSection::default())
    }
}

impl EmbeddingConfig {
    pub fn from_section(section: &EmbeddingSection) -> Self {
        Self {
            provider: section.provider.clone(),
            model: section.model.clone(),
            dimensions: section.dimensions,
            batch_size: section.batch_size,
            endpoint: section.endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.batch_size, 32);
        assert!(config.endpoint.is_none());
    }
}
