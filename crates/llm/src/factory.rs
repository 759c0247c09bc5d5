//! LLM provider factory.
//!
//! Resolves a provider name from configuration into a client.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use courier_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier (currently only "ollama")
/// * `endpoint` - Optional custom endpoint URL
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(provider: &str, endpoint: Option<&str>) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            tracing::debug!("Creating Ollama client for {}", base_url);
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        _ => Err(AppError::Config(format!(
            "Unknown LLM provider: '{}'. Supported providers: ollama",
            provider
        ))),
    }
}
