//! rconhub - RCON host for many game servers
//!
//! Loads the host configuration, opens the ban and ladder stores, then drives
//! every server connection from a single tick loop until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use rcon_config::HostConfig;
use rcon_network::{ConnectionRegistry, HostContext};
use rcon_storage::LadderStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rconhub")]
#[command(about = "Keeps RCON sessions to many game servers and publishes their events")]
struct Args {
    /// Host configuration file
    #[arg(short, long, default_value = "rconhub.cfg")]
    config: PathBuf,

    /// Print the top N ladder entries as JSON and exit
    #[arg(long, value_name = "N")]
    dump_ladder: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = HostConfig::load_from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(count) = args.dump_ladder {
        return dump_ladder(&config, count);
    }

    info!("rconhub {} starting", env!("CARGO_PKG_VERSION"));
    config.display();

    let config = Arc::new(config);
    let ctx = HostContext::open(config.clone()).context("failed to open the persistent stores")?;

    let mut registry = ConnectionRegistry::new();
    for server in &config.servers {
        registry.add(server.clone());
    }
    info!("Managing {} servers", registry.len());

    let mut interval = tokio::time::interval(config.tick_rate);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                registry.tick(&ctx);
                if registry.is_empty() {
                    warn!("Every connection has given up, shutting down");
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
        }
    }

    for conn in registry.iter_mut() {
        conn.terminate("host shutting down");
    }
    ctx.save_ladder().context("failed to save the ladder")?;
    info!("rconhub stopped");
    Ok(())
}

/// `--dump-ladder N`
fn dump_ladder(config: &HostConfig, count: usize) -> anyhow::Result<()> {
    let path = config.ladder_file.as_ref().context("no ladder file is configured")?;
    let ladder = LadderStore::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let top: Vec<_> = ladder.iter().take(count).collect();
    println!("{}", serde_json::to_string_pretty(&top)?);
    Ok(())
}
