//! Ask command handler.
//!
//! Answers a question from the indexed attachments with the local model.

use clap::Args;
use courier_core::{config::AppConfig, AppResult};
use courier_index::IndexManager;

/// Answer a question using the indexed attachments
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to use as context (default: index.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let manager = IndexManager::from_app_config(config)?;
        let k = self.top_k.unwrap_or(config.index.top_k);

        println!("{}", manager.answer(&self.question, k).await);
        Ok(())
    }
}
