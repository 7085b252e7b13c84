//! TaskHelm CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Interactive assistant session (default)
//! - `ingest` — Force re-ingestion of the knowledge corpus
//! - `plans`  — List saved plan files

use clap::{Parser, Subcommand};

mod commands;
mod console;

#[derive(Parser)]
#[command(
    name = "taskhelm",
    about = "TaskHelm — console planning assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive assistant session
    Chat,

    /// Re-ingest the knowledge corpus into the retrieval index
    Ingest,

    /// List saved plan files
    Plans,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::chat::run().await?,
        Commands::Ingest => commands::ingest::run().await?,
        Commands::Plans => commands::plans::run()?,
    }

    Ok(())
}
