//! Answer generation from retrieved context.

use courier_core::{AppError, AppResult};
use courier_llm::{LlmClient, LlmRequest};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;

const ANSWER_TEMPLATE: &str = "\
Answer the following question based only on the provided context. \
If the context does not contain the answer, say that you don't know.

Context:
{{context}}

Question: {{question}}

Answer:";

/// Turns a question plus retrieved context into an answer.
#[async_trait::async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> AppResult<String>;
}

#[derive(Serialize)]
struct PromptVars<'a> {
    context: &'a str,
    question: &'a str,
}

/// Render the grounded-answer prompt.
pub fn render_prompt(question: &str, context: &str) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("answer", ANSWER_TEMPLATE)
        .map_err(|e| AppError::Llm(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("answer", &PromptVars { context, question })
        .map_err(|e| AppError::Llm(format!("Failed to render template: {}", e)))
}

/// Answer generator backed by a completion model.
pub struct LlmAnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
}

impl LlmAnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait::async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(&self, question: &str, context: &str) -> AppResult<String> {
        let prompt = render_prompt(question, context)?;
        let request = LlmRequest::new(prompt, &self.model).with_temperature(self.temperature);

        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            context_chars = context.len(),
            "Generating answer"
        );

        let response = self.client.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }
}
