//! claim-node: operator CLI for the quest claim store
//!
//! Works directly on the SQLite database the claim engine writes:
//! - Import authored quests
//! - Inspect eligibility, the leaderboard and inventories
//! - Capture referrals from share links
//! - Map prize-wheel rotations to segments

mod cli;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use claim_engine::SqliteClaimStore;

use cli::{Commands, NodeContext};
use config::Config;

#[derive(Parser)]
#[command(name = "claim-node")]
#[command(about = "Operator CLI for the quest claim store")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "claim-node.toml")]
    config: PathBuf,

    /// SQLite database (overrides config file)
    #[arg(short, long, env = "CLAIM_NODE_DB")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claim_node=info".parse()?)
                .add_directive("claim_engine=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(database) = cli.database {
        config.node.database = database;
    }

    debug!(config = %cli.config.display(), "Config loaded");
    info!(
        database = %config.node.database.display(),
        engine_id = %config.claim.engine_id,
        "Opening claim store"
    );

    let store = SqliteClaimStore::open(&config.node.database)
        .with_context(|| format!("opening {}", config.node.database.display()))?;

    let ctx = NodeContext {
        store: Arc::new(store),
        config: config.claim,
    };

    let output = cli::execute(&ctx, cli.command).await?;
    println!("{output}");
    Ok(())
}
