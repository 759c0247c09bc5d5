//! Courier CLI
//!
//! Main entry point for the courier command-line tool.
//! Keeps an embedding index of an attachments directory and answers
//! questions from it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, BuildCommand, QueryCommand, ServeCommand, StatusCommand};
use courier_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Courier - question answering over a watched attachments directory
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Question answering over a watched attachments directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "COURIER_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Attachments directory to index
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Directory holding the persisted snapshot
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Embedding provider (trigram, ollama)
    #[arg(long, global = true, env = "COURIER_EMBEDDING_PROVIDER")]
    embedding_provider: Option<String>,

    /// Model used for answer generation
    #[arg(short, long, global = true, env = "COURIER_LLM_MODEL")]
    model: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the index once
    Build(BuildCommand),

    /// Print the context retrieved for a question
    Query(QueryCommand),

    /// Answer a question from the indexed attachments
    Ask(AskCommand),

    /// Show the current snapshot
    Status(StatusCommand),

    /// Watch the attachments directory and answer questions from stdin
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Explicit flags win over COURIER_WORKSPACE / COURIER_CONFIG
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    let config = config.with_overrides(
        cli.workspace,
        cli.source_dir,
        cli.index_dir,
        cli.embedding_provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Courier CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Source directory: {:?}", config.source_dir());
    tracing::debug!("Index directory: {:?}", config.persist_dir());

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Query(_) => "query",
        Commands::Ask(_) => "ask",
        Commands::Status(_) => "status",
        Commands::Serve(_) => "serve",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Serve(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_env_names_match_config_loader() {
        let command = Cli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .and_then(|env| env.to_str())
                .map(str::to_string)
        };

        assert_eq!(env_of("model").as_deref(), Some("COURIER_LLM_MODEL"));
        assert_eq!(
            env_of("embedding_provider").as_deref(),
            Some("COURIER_EMBEDDING_PROVIDER")
        );
        assert_eq!(env_of("workspace").as_deref(), Some("COURIER_WORKSPACE"));
    }
}
