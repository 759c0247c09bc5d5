//! Answer-generation client crate for Courier.
//!
//! A provider-agnostic trait for completion-style language model calls,
//! plus the local Ollama implementation the question tools use to turn
//! retrieved attachment passages into an answer.
//!
//! # Example
//! ```no_run
//! use courier_llm::{LlmClient, LlmRequest, OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Summarize the invoice", "llama3");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse};
pub use factory::create_client;
pub use providers::OllamaClient;
