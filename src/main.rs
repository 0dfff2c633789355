//! Crash Game Server
//!
//! Runs the WebSocket room, or with `simulate [rounds] [seed]` plays rounds
//! headless with a deterministic seed source and a cashout bot.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crash_server::{
    VERSION,
    config::{GameConfig, ServerConfig},
    network::GameServer,
    simulation::{run_simulation, SimulationConfig},
};

/// Grace period for connections to flush their shutdown frame.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    #[cfg(feature = "debug-tracing")]
    let default_filter = "debug";
    #[cfg(not(feature = "debug-tracing"))]
    let default_filter = "info";

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env().context("Invalid configuration")?;

    info!("Crash Server v{}", VERSION);
    info!(
        "Tick Rate: {} Hz, betting window {}s, cooldown {}s, 1 in {} rounds crash instantly",
        config.game.tick_rate,
        config.game.waiting_time,
        config.game.end_time,
        config.game.crash_per
    );

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("simulate") => {
            let rounds = match args.next() {
                Some(raw) => raw.parse().with_context(|| format!("Invalid round count {:?}", raw))?,
                None => 1000,
            };
            let seed = match args.next() {
                Some(raw) => raw.parse().with_context(|| format!("Invalid seed {:?}", raw))?,
                None => 12345,
            };
            simulate(config.game, rounds, seed);
            Ok(())
        }
        Some(other) => anyhow::bail!("Unknown command {:?} (expected `simulate [rounds] [seed]`)", other),
        None => serve(config).await,
    }
}

/// Run the WebSocket server until Ctrl-C.
async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    info!("Server stopped");
    Ok(())
}

/// Play rounds headless and log the report.
fn simulate(game: GameConfig, rounds: u32, seed: u64) {
    let config = SimulationConfig { game, rounds, seed, ..Default::default() };
    info!("=== Simulating {} rounds (seed {}) ===", rounds, seed);

    let report = run_simulation(&config);

    info!("=== Simulation Results ===");
    info!(
        "Rounds at 1.00x: {} ({:.2}%)",
        report.rounds_at_one,
        report.at_one_rate() * 100.0
    );
    info!("Mean crash point: {:.3}x", report.mean_crash_point());
    info!("Highest crash point: {:.2}x", report.highest_crash_point());
    info!(
        "Bot cashouts at {:.1}x: {}, busts: {}",
        config.cashout_at, report.cashouts, report.busts
    );
    info!("Bot balance: {}", report.final_balance);
}
