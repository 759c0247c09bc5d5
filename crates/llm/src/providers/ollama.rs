//! Ollama LLM provider implementation.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use courier_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Generation can take minutes on CPU-only hosts.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            options: request
                .temperature
                .map(|temperature| OllamaOptions { temperature }),
            stream: false,
        }
    }
}

impl From<OllamaResponse> for LlmResponse {
    fn from(response: OllamaResponse) -> Self {
        Self {
            content: response.response,
            model: response.model,
            prompt_tokens: response.prompt_eval_count.unwrap_or(0),
            completion_tokens: response.eval_count.unwrap_or(0),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending completion request to Ollama");

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        let converted = LlmResponse::from(ollama_response);
        tracing::debug!(
            prompt_tokens = converted.prompt_tokens,
            completion_tokens = converted.completion_tokens,
            "Received completion from Ollama"
        );

        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::with_base_url("http://gpu-box:11434/");
        assert_eq!(client.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();

        let plain = client.to_ollama_request(&LlmRequest::new("Hello", "llama3"));
        assert_eq!(plain.model, "llama3");
        assert_eq!(plain.prompt, "Hello");
        assert!(plain.options.is_none());
        assert!(!plain.stream);

        let request = LlmRequest::new("Hello", "llama3").with_temperature(0.7);
        let tuned = client.to_ollama_request(&request);
        assert_eq!(tuned.options, Some(OllamaOptions { temperature: 0.7 }));
    }

    #[test]
    fn test_response_conversion() {
        let raw = r#"{"model":"llama3","response":"It is due Friday.","done":true,"prompt_eval_count":40,"eval_count":6}"#;
        let parsed: OllamaResponse = serde_json::from_str(raw).unwrap();

        let response = LlmResponse::from(parsed);
        assert_eq!(response.content, "It is due Friday.");
        assert_eq!(response.prompt_tokens, 40);
        assert_eq!(response.completion_tokens, 6);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_llm_error() {
        let client = OllamaClient::with_base_url("http://127.0.0.1:9");
        let result = client.complete(&LlmRequest::new("hi", "llama3")).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }
}
