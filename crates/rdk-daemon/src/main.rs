//! rdk-daemon entry point.
//!
//! Sets up tracing, loads config, builds the pipeline and shared state, wires
//! middleware, and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state types live in `state.rs`.
//!
//! Environment:
//! - `RDK_CONFIG`: comma-separated YAML paths in merge order (optional)
//! - `RDK_DATA_DIR`: CSV data directory (default `data`)
//! - `RDK_RESULTS_DIR`: result store directory (default `results`)
//! - `RDK_DAEMON_ADDR`: bind address (default `127.0.0.1:8899`)
//! - `RDK_MAX_RETAINED_RUNS`: finished runs kept in the run table (default 256)

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use rdk_config::LoadedConfig;
use rdk_daemon::{routes, state};
use rdk_md::CsvDirSource;
use rdk_pipeline::{JsonDirStore, Pipeline, ValidationConfig};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config_from_env()?;
    let config = ValidationConfig::from_loaded(&loaded)?;
    info!(
        config_hash = %loaded.config_hash,
        preset = config.preset.as_str(),
        workers = config.pool.workers,
        "config loaded"
    );

    let data_dir = env_or("RDK_DATA_DIR", "data");
    let results_dir = env_or("RDK_RESULTS_DIR", "results");
    let pipeline = Pipeline::new(
        config,
        loaded.config_hash,
        Arc::new(CsvDirSource::new(&data_dir)),
        Arc::new(rdk_backtest::reference::registry()?),
    )?;
    let max_runs = max_retained_runs_from_env();
    let shared = Arc::new(
        state::AppState::new(Arc::new(pipeline), Arc::new(JsonDirStore::new(&results_dir)))
            .with_max_retained_runs(max_runs),
    );

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!(%data_dir, %results_dir, max_runs, "rdk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_config_from_env() -> anyhow::Result<LoadedConfig> {
    let Ok(raw) = std::env::var("RDK_CONFIG") else {
        return Ok(LoadedConfig::empty());
    };
    let paths: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if paths.is_empty() {
        return Ok(LoadedConfig::empty());
    }
    rdk_config::load_layered_yaml(&paths)
}

fn max_retained_runs_from_env() -> usize {
    std::env::var("RDK_MAX_RETAINED_RUNS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(state::DEFAULT_MAX_RETAINED_RUNS)
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("RDK_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
