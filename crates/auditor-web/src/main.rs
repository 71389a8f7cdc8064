//! Fairness auditor web server
//!
//! Run with: cargo run -p auditor-web

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auditor_common::AuditorConfig;
use auditor_web::{router::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auditor=debug,info")),
        )
        .init();

    info!("Starting fairness auditor v{}", env!("CARGO_PKG_VERSION"));

    let config = AuditorConfig::load().context("loading auditor.toml")?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("server.host/server.port do not form a socket address")?;
    info!(
        max_upload_bytes = config.server.max_upload_bytes,
        n_samples = config.training.default_n_samples,
        eps = config.mitigation.eps,
        "Configuration loaded"
    );

    let app = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
