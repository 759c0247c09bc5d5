//! Query command handler.
//!
//! Prints the context retrieved for a question, without calling a model.

use super::print_json;
use clap::Args;
use courier_core::{config::AppConfig, AppResult};
use courier_index::IndexManager;

/// Retrieve the passages most relevant to a question
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to retrieve (default: index.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output scored hits as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command");

        let manager = IndexManager::from_app_config(config)?;
        let k = self.top_k.unwrap_or(config.index.top_k);

        if self.json {
            let retrieval = manager.retrieve(&self.query, k).await?;
            print_json(&retrieval)?;
        } else {
            println!("{}", manager.query_documents(&self.query, k).await);
        }

        Ok(())
    }
}
