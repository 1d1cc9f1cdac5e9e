//! Bulwark server binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bulwark::ratelimit::RateLimiter;
use bulwark::{AppConfig, AppState, ConfigOverrides, create_router};
use bulwark_common::RuntimePosture;

/// Interval between sweeps of expired in-memory windows
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Bulwark - rate limiting, CSRF, and upload guards
#[derive(Parser, Debug)]
#[command(name = "bulwark")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/bulwark.toml")]
    config: String,

    /// Redis URL for the distributed counter store (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Redis password / access token (overrides config)
    #[arg(long, env = "REDIS_TOKEN", hide_env_values = true)]
    redis_token: Option<String>,

    /// Runtime posture: production or development (overrides config)
    #[arg(long, env = "APP_ENV")]
    posture: Option<RuntimePosture>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen.clone(),
            redis_url: self.redis_url.clone(),
            redis_token: self.redis_token.clone(),
            posture: self.posture,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside local development
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Bulwark v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args.overrides())?;
    info!(
        path = %args.config,
        posture = ?config.posture,
        counter_store = ?config.counter_store,
        trust_proxy = config.trust_proxy,
        "Configuration loaded"
    );

    if config.fails_closed() {
        warn!("No counter store configured in production; rate-limited routes will answer 500");
    }

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let sweep_shutdown = shutdown_tx.subscribe();
    tokio::spawn(sweep_worker(state.limiter.clone(), sweep_shutdown));

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("Bulwark listening on {}", listen_addr);

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C; shutting down");
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    // Peer addresses feed the rate limiter's client identity
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Bulwark shutdown complete");
    Ok(())
}

/// Periodically drop expired in-memory windows
async fn sweep_worker(limiter: Arc<RateLimiter>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired rate limit windows");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Sweep worker stopping");
                break;
            }
        }
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
