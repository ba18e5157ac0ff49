//! remt-api - Apartment transaction map service
//!
//! Serves regional apartment trade reports, building price histories and
//! keyword searches backed by the public data.go.kr trade report API, plus
//! Kakao address geocoding for map placement.

use anyhow::{Context, Result};
use clap::Parser;
use remt_common::config::{load_config, resolve_secret, LoggingConfig};
use remt_common::time::offset_hours;
use remt_common::{Clock, SystemClock};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use remt_api::cache::WindowCache;
use remt_api::query::{EngineSettings, QueryEngine};
use remt_api::services::{DataGoKrClient, Geocoder, KakaoGeocoder};
use remt_api::{build_router, AppState};

const MODULE_NAME: &str = "remt-api";

/// Command-line arguments for remt-api
#[derive(Parser, Debug)]
#[command(name = "remt-api")]
#[command(about = "Apartment transaction map service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "REMT_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(short, long, env = "REMT_BIND")]
    bind: Option<String>,

    /// Config file path
    #[arg(short, long, env = "REMT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing exists so the configured level applies
    let (config, config_source) =
        load_config(args.config.as_deref(), MODULE_NAME).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting {} v{} (git {}, built {}, {})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let service_key = resolve_secret("DATA_GO_KR_API_KEY", config.upstream.service_key.as_deref());
    if service_key.is_none() {
        warn!("DATA_GO_KR_API_KEY not configured; the trade report service will reject requests");
    }
    let provider = DataGoKrClient::from_config(&config.upstream, service_key)
        .context("Failed to create trade report client")?;

    let geocoder: Option<Arc<dyn Geocoder>> =
        match resolve_secret("KAKAO_REST_API_KEY", config.geocoder.api_key.as_deref()) {
            Some(key) => Some(Arc::new(
                KakaoGeocoder::from_config(&config.geocoder, key).context("Failed to create geocoder")?,
            )),
            None => {
                warn!("KAKAO_REST_API_KEY not configured; geocoding endpoints will return 503");
                None
            }
        };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(WindowCache::new(config.cache.ttl(), Arc::clone(&clock)));
    let settings = EngineSettings {
        page_size: config.upstream.page_size,
        fetch_timeout: config.upstream.timeout(),
        utc_offset: offset_hours(config.upstream.utc_offset_hours),
    };
    info!(
        "Window cache TTL {}s, page size {}, upstream timeout {}s, UTC offset {}",
        config.cache.ttl_secs, settings.page_size, config.upstream.timeout_secs, settings.utc_offset
    );

    let engine = QueryEngine::new(Arc::new(provider), cache, clock, settings);
    let app = build_router(AppState::new(engine, geocoder));

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "remt_api={level},remt_common={level},tower_http={level}",
            level = logging.level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
