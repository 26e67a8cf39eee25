//! vmix-mx - Voice/music/soundscape mix-down microservice
//!
//! Accepts POST /mix with up to three source URLs, mixes them through ffmpeg
//! and returns the MP3. GET /health reports uptime and the last failure.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vmix_common::{ConfigOverrides, ConfigResolver};
use vmix_mx::mix::{sweep_scratch_dir, FfmpegEngine, HttpFetcher, MixService};
use vmix_mx::{build_router, AppState};

/// Command-line arguments for vmix-mx
#[derive(Parser, Debug)]
#[command(name = "vmix-mx")]
#[command(about = "Voice/music/soundscape mix-down microservice")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "VMIX_HOST")]
    host: Option<String>,

    /// Port to listen on (falls back to PORT, then the config file)
    #[arg(short, long, env = "VMIX_PORT")]
    port: Option<u16>,

    /// Directory for downloaded sources and mixed output
    #[arg(long, env = "VMIX_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long, env = "VMIX_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "VMIX_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        host: args.host,
        port: args.port,
        scratch_dir: args.scratch_dir,
        ffmpeg_path: args.ffmpeg,
        log_level: args.log_level,
    };
    let config = ConfigResolver::new(args.config)
        .resolve(&overrides)
        .context("Failed to resolve configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vmix_mx={0},vmix_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting vmix-mx v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .with_context(|| format!("Failed to create scratch dir {}", config.scratch_dir.display()))?;
    info!("Scratch directory: {}", config.scratch_dir.display());
    let swept = sweep_scratch_dir(&config.scratch_dir)
        .with_context(|| format!("Failed to sweep scratch dir {}", config.scratch_dir.display()))?;
    if swept.released > 0 || swept.failed > 0 {
        warn!(
            removed = swept.released,
            failed = swept.failed,
            "Removed stale scratch files from a previous run"
        );
    }
    info!("Engine: {}", config.ffmpeg_path.display());

    let fetcher = HttpFetcher::new(config.fetch_timeout).context("Failed to build fetcher")?;
    let engine = FfmpegEngine::new(config.ffmpeg_path.clone());
    let mixer = MixService::new(Arc::new(fetcher), Arc::new(engine), &config);

    let state = AppState::new(mixer);
    let app = build_router(state);

    let ip: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid listen host {}", config.host))?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
