//! Trade Simulator
//!
//! Subscribes to an L2 order-book stream, simulates a market order against
//! every new snapshot and redraws the estimated costs on a fixed refresh
//! until Ctrl+C.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tradesim_backend::{
    config::SimulatorConfig,
    report::{self, CLEAR_SCREEN},
    Simulator,
};

#[derive(Parser, Debug)]
#[command(name = "tradesim")]
#[command(about = "Real-time market order cost simulator over an L2 order-book feed")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long, env = "TRADESIM_CONFIG")]
    config: Option<PathBuf>,

    /// Write the default configuration to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let args = Args::parse();

    if let Some(path) = args.dump_config {
        SimulatorConfig::default().save(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = SimulatorConfig::resolve(args.config.as_deref())?;
    init_tracing(config.log_file.as_deref())?;

    info!(
        exchange = %config.labels.exchange,
        asset = %config.labels.asset,
        quantity = config.simulation.quantity,
        "trade_simulator_starting"
    );

    let mut simulator = Simulator::new(config.clone())?;
    simulator.start()?;

    let mut refresh = tokio::time::interval(config.refresh_interval());
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "ctrl_c_listener_failed");
                }
                info!("shutdown_requested");
                break;
            }
            _ = refresh.tick() => {
                let text = report::render(&config, &simulator.current_result());
                let mut stdout = std::io::stdout().lock();
                let _ = write!(stdout, "{}{}", CLEAR_SCREEN, text);
                let _ = stdout.flush();

                if simulator.ingest_finished() {
                    warn!("feed_ingest_ended");
                    println!("\nFeed connection ended; see the log for details.");
                    break;
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || simulator.stop())
        .await
        .context("Shutdown task failed")?;

    Ok(())
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate root
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

/// Log to `log_file` when set so the redrawn screen stays clean; stderr otherwise
fn init_tracing(log_file: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tradesim_backend=info,tradesim=info".into());

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}
