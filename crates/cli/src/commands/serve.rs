//! Serve command handler.
//!
//! Builds the index once, keeps it in step with the attachments directory,
//! and answers questions read line by line from stdin until EOF or Ctrl-C.

use clap::Args;
use courier_core::{config::AppConfig, AppError, AppResult};
use courier_index::{BuildStatus, IndexManager};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Watch the attachments directory and answer questions from stdin
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Number of chunks to use as context (default: index.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Print retrieved context instead of generating an answer
    #[arg(long)]
    pub context_only: bool,

    /// Skip the startup rebuild and serve the persisted snapshot
    #[arg(long)]
    pub no_initial_build: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        let manager = Arc::new(IndexManager::from_app_config(config)?);
        let k = self.top_k.unwrap_or(config.index.top_k);

        if !self.no_initial_build {
            let report = manager.build_index().await;
            if report.status == BuildStatus::Failed {
                tracing::warn!(
                    "Initial build failed, serving snapshot v{}",
                    report.version
                );
            }
        }

        manager.start_file_monitor()?;
        eprintln!(
            "Watching {} (snapshot v{}). Type a question, Ctrl-D to quit.",
            manager.config().source_dir.display(),
            manager.version()
        );

        let result = self.serve_lines(&manager, k).await;

        // Dropping the debounce worker joins its thread
        let stopper = Arc::clone(&manager);
        tokio::task::spawn_blocking(move || stopper.stop_file_monitor())
            .await
            .map_err(|e| AppError::Watch(format!("Failed to stop file monitor: {}", e)))?;

        result
    }

    async fn serve_lines(&self, manager: &IndexManager, k: usize) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                    return Ok(());
                }
            };

            let Some(line) = line else {
                tracing::info!("End of input, shutting down");
                return Ok(());
            };

            let question = line.trim();
            if question.is_empty() {
                continue;
            }

            let output = if self.context_only {
                manager.query_documents(question, k).await
            } else {
                manager.answer(question, k).await
            };
            println!("{}\n", output);
        }
    }
}
