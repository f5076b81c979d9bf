//! geoagent CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP API server
//! - `migrate` — Apply the database schema
//! - `ask`     — Send one message and stream the run to the terminal
//! - `tools`   — Show the merged tool catalog

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "geoagent",
    about = "geoagent — conversational GIS agent backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a config file (defaults to ~/.geoagent/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database schema
    Migrate,

    /// Send a single message to the agent
    Ask {
        /// The message to send
        message: String,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Keep everything in memory instead of the database
        #[arg(long)]
        ephemeral: bool,
    },

    /// List the tools the agent can call
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Ask {
            message,
            conversation,
            ephemeral,
        } => commands::ask::run(config, message, conversation, ephemeral).await?,
        Commands::Tools => commands::tools::run(config).await?,
    }

    Ok(())
}
