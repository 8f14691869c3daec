//! Kiosk Player (kiosk-player) - Main entry point
//!
//! Runs the playback scheduler and the HTTP server that feeds it and
//! streams `play` events to display clients.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_common::config::resolve_config_file;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiosk_player::api::{create_router, AppState};
use kiosk_player::config::{TomlConfig, APP_NAME, CONFIG_ENV_VAR};
use kiosk_player::playback::{DurationResolver, FfprobeProbe, Scheduler};
use kiosk_player::sse::SseBroadcaster;
use kiosk_player::uploads::UploadStore;

/// Command-line arguments for kiosk-player
#[derive(Parser, Debug)]
#[command(name = "kiosk-player")]
#[command(about = "Playback scheduler for kiosk displays")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "KIOSK_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(long, env = "KIOSK_BIND")]
    bind: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log filter
    let location = resolve_config_file(args.config.as_deref(), CONFIG_ENV_VAR, APP_NAME);
    let mut config = TomlConfig::load(location.as_ref()).context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Kiosk Player (kiosk-player) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &location {
        Some(location) if location.path.exists() => {
            info!("Configuration: {}", location.path.display())
        }
        _ => warn!("No configuration file found, using built-in defaults"),
    }

    // Scheduler with ffprobe-backed resolver and SSE sink
    let policy = config.playback.delay_policy();
    info!(
        "Delays: image {}ms, transition {}ms, video fallback {}ms, probe timeout {}ms",
        policy.image_default.as_millis(),
        policy.transition.as_millis(),
        policy.fallback_video.as_millis(),
        policy.probe_timeout.as_millis()
    );
    let probe = Arc::new(FfprobeProbe::new(config.probe.ffprobe_path.clone()));
    let broadcaster = SseBroadcaster::new(config.events.channel_capacity, config.events.keep_alive());
    let (scheduler, driver) = Scheduler::start(
        DurationResolver::new(policy, probe),
        Arc::new(broadcaster.clone()),
    );

    // Uploads from a previous run are never replayed
    let uploads = UploadStore::new(
        config.uploads.dir.clone(),
        &config.uploads.public_url,
        config.uploads.max_upload_bytes(),
    );
    let cleared = uploads
        .prepare()
        .with_context(|| format!("Failed to prepare upload folder {}", uploads.dir().display()))?;
    info!(
        "Upload folder {} ({} stale files removed)",
        uploads.dir().display(),
        cleared
    );

    let app = create_router(AppState::new(scheduler.clone(), broadcaster.clone(), uploads));

    let ip: IpAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_addr))?;
    let addr = SocketAddr::new(ip, config.port);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Open SSE streams never finish on their own; close them with the scheduler
    let stopping = scheduler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            stopping.shutdown();
            broadcaster.close();
        })
        .await
        .context("Server error")?;

    driver.await.context("Scheduler task failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
