//! blockmind CLI, the main entry point.
//!
//! Commands:
//! - `start`   Launch agents into the world and run until Ctrl-C
//! - `doctor`  Diagnose config, oracle and memory store
//! - `memory`  Query an agent's long-term log
//! - `onboard` Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "blockmind",
    about = "blockmind: autonomous LLM-driven agents for block worlds",
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

    /// Config file to use instead of ~/.blockmind/config.toml
    #[arg(short, long, global = true, env = "BLOCKMIND_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch agents and run until interrupted
    Start {
        /// Agent to launch, as NAME[:trait=value,...]; repeatable. Replaces the configured roster.
        #[arg(short, long = "agent", value_name = "SPEC")]
        agents: Vec<String>,

        /// Override the world host
        #[arg(long)]
        host: Option<String>,

        /// Override the world port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose system health
    Doctor,

    /// Query an agent's long-term memory
    Memory {
        #[command(subcommand)]
        query: commands::memory::MemoryQuery,
    },

    /// Initialize configuration
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Start { agents, host, port } => {
            commands::start::run(config, agents, host, port).await?
        }
        Commands::Doctor => commands::doctor::run(config).await?,
        Commands::Memory { query } => commands::memory::run(config, query).await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
