// SYNOID Stitch Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use synoid_stitch::config::{ServeArgs, StitchConfig};
use synoid_stitch::health::{self, CheckStatus};
use synoid_stitch::server;
use synoid_stitch::state::StitchState;
use synoid_stitch::stitch::expiry::ExpirySweeper;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synoid-stitch")]
#[command(about = "SYNOID Stitch: segment concatenation server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the stitch server
    Serve(ServeArgs),

    /// Check FFmpeg and directory access, then exit
    Doctor(ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        error!("[PANIC] at {}: {}", location, panic_info);
    }));

    let args = Cli::parse();

    match args.command {
        Commands::Serve(serve) => {
            let config = StitchConfig::from_args(serve)?;
            info!("--- SYNOID STITCH v{} ---", env!("CARGO_PKG_VERSION"));

            tokio::fs::create_dir_all(&config.temp_dir).await?;
            if config.is_local() {
                tokio::fs::create_dir_all(&config.public_dir).await?;
            }

            if let CheckStatus::Down(reason) = health::check_ffmpeg(&config.ffmpeg_path).await {
                warn!("FFmpeg unavailable: {}. Stitch requests will fail.", reason);
            }

            let state = Arc::new(StitchState::from_config(&config)?);

            let sweeper = match &state.registry {
                Some(registry) => {
                    registry.purge_orphans().await?;
                    info!(
                        "Local publishing to {:?} ({} min TTL)",
                        config.public_dir,
                        config.expiration.num_minutes()
                    );
                    Some(ExpirySweeper::start(registry.clone(), config.sweep_interval))
                }
                None => {
                    info!("Remote publishing to object store");
                    None
                }
            };

            server::start_server(config.port, state).await?;

            if let Some(sweeper) = sweeper {
                sweeper.stop();
            }
            info!("Stitch server stopped.");
        }
        Commands::Doctor(serve) => {
            let config = StitchConfig::from_args(serve)?;
            let mut healthy = true;
            for (name, status) in health::run_checks(&config).await {
                match status {
                    CheckStatus::Healthy(detail) => println!("[OK]   {}: {}", name, detail),
                    CheckStatus::Down(detail) => {
                        healthy = false;
                        println!("[FAIL] {}: {}", name, detail);
                    }
                }
            }
            if !healthy {
                anyhow::bail!("one or more checks failed");
            }
        }
    }

    Ok(())
}
