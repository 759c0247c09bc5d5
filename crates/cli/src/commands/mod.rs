//! Command handlers for the Courier CLI.

pub mod ask;
pub mod build;
pub mod query;
pub mod serve;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use build::BuildCommand;
pub use query::QueryCommand;
pub use serve::ServeCommand;
pub use status::StatusCommand;

use courier_core::{AppError, AppResult};
use serde::Serialize;

/// Pretty-print a value as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
    println!("{}", output);
    Ok(())
}
