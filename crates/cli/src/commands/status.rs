//! Status command handler.

use super::print_json;
use clap::Args;
use courier_core::{config::AppConfig, AppResult};
use courier_index::IndexManager;

/// Show what the current snapshot contains
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let manager = IndexManager::from_app_config(config)?;
        let status = manager.status().await;

        if self.json {
            return print_json(&status);
        }

        println!("Source directory: {}", status.source_dir.display());
        println!("Index directory:  {}", status.persist_dir.display());

        match status.snapshot {
            None => println!("No snapshot built yet"),
            Some(snapshot) => {
                println!(
                    "Snapshot v{} built {} ({}/{}, {} dims)",
                    snapshot.version,
                    snapshot.built_at.to_rfc3339(),
                    snapshot.provider,
                    snapshot.model,
                    snapshot.dimensions
                );
                println!(
                    "{} documents, {} chunks",
                    snapshot.documents.len(),
                    snapshot.chunk_count
                );
                for doc in &snapshot.documents {
                    println!(
                        "- {} ({}, {} bytes, {} chunks)",
                        doc.path.display(),
                        doc.content_type,
                        doc.size_bytes,
                        doc.chunk_count
                    );
                }
            }
        }

        Ok(())
    }
}
