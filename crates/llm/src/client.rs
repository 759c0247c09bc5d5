//! Completion client abstraction.

use courier_core::AppResult;
use serde::{Deserialize, Serialize};

/// One prompt for the answer-generation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,
    pub model: String,

    /// Sampling temperature; the server default applies when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The finished answer text and the token counts the server reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A completion-style language model.
///
/// Answer generation is a single non-streaming call: the question tools
/// expect one finished string per invocation.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider identifier (e.g. "ollama").
    fn provider_name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
