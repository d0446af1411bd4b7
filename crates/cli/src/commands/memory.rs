//! `blockmind memory`: query an agent's long-term log.

use blockmind_core::ActionToken;
use clap::Subcommand;
use std::path::Path;

#[derive(Debug, Subcommand)]
pub enum MemoryQuery {
    /// Recent successful experiences for one action
    Outcomes {
        /// Agent whose log to read
        #[arg(short, long)]
        agent: String,

        /// Action token, e.g. `explore` or `craft`
        #[arg(long)]
        action: ActionToken,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Recent chat exchanges with one peer
    Interactions {
        #[arg(short, long)]
        agent: String,

        /// The other player's name
        #[arg(long)]
        peer: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Recently visited places
    Locations {
        #[arg(short, long)]
        agent: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

pub async fn run(
    config_path: Option<&Path>,
    query: MemoryQuery,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let store =
        blockmind_memory::open_store(&config.memory.backend, &config.memory.resolved_path())
            .await?;

    match query {
        MemoryQuery::Outcomes {
            agent,
            action,
            limit,
        } => {
            let rows = store.successful_experiences(&agent, action, limit).await?;
            println!("🧠 {agent}: successful '{action}' ({} found)", rows.len());
            println!("====================");
            for row in rows {
                println!(
                    "  {}  {}",
                    row.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    row.result
                );
                println!("      {}", row.snapshot);
            }
        }
        MemoryQuery::Interactions { agent, peer, limit } => {
            let rows = store.interactions_with(&agent, &peer, limit).await?;
            println!("💬 {agent} ↔ {peer} ({} found)", rows.len());
            println!("====================");
            for row in rows {
                println!(
                    "  {}  {}: {}",
                    row.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    row.peer,
                    row.message
                );
                println!("      {agent}: {}", row.reply);
            }
        }
        MemoryQuery::Locations { agent, limit } => {
            let rows = store.locations(&agent, limit).await?;
            println!("🗺️  {agent}: visited locations ({} found)", rows.len());
            println!("====================");
            for row in rows {
                let p = row.position;
                println!(
                    "  {}  ({:.0}, {:.0}, {:.0})  {}  {}",
                    row.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    p.x,
                    p.y,
                    p.z,
                    row.biome,
                    row.notable_blocks.join(", ")
                );
            }
        }
    }

    store.close().await?;
    Ok(())
}
