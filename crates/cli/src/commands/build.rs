//! Build command handler.
//!
//! Runs one full rebuild of the attachment index.

use super::print_json;
use clap::Args;
use courier_core::{config::AppConfig, AppError, AppResult};
use courier_index::{BuildStatus, IndexManager};

/// Rebuild the index from the attachments directory
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let manager = IndexManager::from_app_config(config)?;
        let report = manager.build_index().await;

        if self.json {
            print_json(&report)?;
        } else {
            match report.status {
                BuildStatus::Built => println!(
                    "Built snapshot v{}: {} documents, {} chunks in {:.2}s",
                    report.version, report.document_count, report.chunk_count, report.duration_secs
                ),
                BuildStatus::SkippedEmpty => println!(
                    "No documents in {}; snapshot v{} unchanged",
                    manager.config().source_dir.display(),
                    report.version
                ),
                BuildStatus::Failed => println!(
                    "Build failed: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }

        if report.status == BuildStatus::Failed {
            return Err(AppError::Index(
                report.error.unwrap_or_else(|| "build failed".to_string()),
            ));
        }

        Ok(())
    }
}
