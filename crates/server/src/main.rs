//! kbchat
//!
//! Main entry point for the knowledge-base chat service.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{PromptsCommand, ServeCommand};
use kbchat_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Knowledge-base chat service with streamed, cited answers
#[derive(Parser, Debug)]
#[command(name = "kbchat")]
#[command(about = "Knowledge-base chat service with streamed, cited answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "KBCHAT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "KBCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Default model for requests that name none
    #[arg(short, long, global = true, env = "KBCHAT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeCommand),

    /// List prompt definitions
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load(cli.workspace, cli.config).context("Failed to load configuration")?;

    let bind = match &cli.command {
        Commands::Serve(cmd) => cmd.bind.clone(),
        Commands::Prompts(_) => None,
    };
    let config = config.with_overrides(bind, cli.model, cli.log_level, cli.verbose, cli.no_color);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)
        .context("Failed to initialize logging")?;

    tracing::info!("kbchat starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Default model: {}", config.chat.default_model);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("kbchat {} failed", command_name))
}
