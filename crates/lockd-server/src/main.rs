//! lockd HTTP Server
//!
//! Grants mutually exclusive, time-bounded, reentrant leases over named
//! business resources to HTTP/JSON clients.

use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use lockd_core::{LockRegistry, RegistryConfig};
use lockd_server::{create_routes, AppState};

/// lockd HTTP Server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, env = "LOCKD_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Timeout applied when an acquire request omits one, in seconds
    #[arg(long, env = "LOCKD_DEFAULT_TIMEOUT_SECS", default_value_t = 60)]
    default_timeout_secs: u64,

    /// Requests above this are clamped down, not rejected
    #[arg(long, env = "LOCKD_MAX_TIMEOUT_SECS", default_value_t = 3600)]
    max_timeout_secs: u64,

    /// How often the background sweeper scans for expired leases
    #[arg(long, env = "LOCKD_SWEEP_INTERVAL_SECS", default_value_t = 1)]
    sweep_interval_secs: u64,

    /// Upper bound on leases the sweeper removes per scan
    #[arg(long, env = "LOCKD_SWEEP_BATCH_SIZE", default_value_t = 256)]
    sweep_batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    info!("Starting lockd server...");

    let config = RegistryConfig {
        default_timeout_secs: args.default_timeout_secs,
        max_timeout_secs: args.max_timeout_secs,
        sweep_interval_secs: args.sweep_interval_secs,
        sweep_batch_size: args.sweep_batch_size,
    };
    let registry = Arc::new(LockRegistry::new(config));
    let state = AppState::new(Arc::clone(&registry));

    let _sweeper = lockd_core::sweeper::spawn(Arc::clone(&registry));

    let app = Router::new()
        .nest("/api", create_routes(state))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("Server listening on http://{}", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
