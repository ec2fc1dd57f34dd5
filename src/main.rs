//! Monopoly economy simulator.
//!
//! Entry point. Loads configuration, initialises structured logging, loads
//! the board and plays one seeded self-play game between automated players,
//! printing the summary as JSON.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

use monopoly_economy::config;
use monopoly_economy::engine::Simulation;
use monopoly_economy::storage;

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("MONOPOLY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    init_logging();

    let board = storage::load_board_or_classic(cfg.simulation.board_path.as_deref())?;
    info!(
        config = %config_path,
        properties = board.len(),
        players = cfg.simulation.players,
        seed = cfg.simulation.seed,
        "Simulator starting up"
    );

    let seed = cfg.simulation.seed;
    let simulation = Simulation::new(Arc::new(board), cfg).await;
    let mut rng = StdRng::seed_from_u64(seed);
    let report = simulation.run(&mut rng).await?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("monopoly_economy=info"));

    let json_logging = std::env::var("MONOPOLY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
