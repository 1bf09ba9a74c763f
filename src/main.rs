//! Quake relay — Binary Entrypoint
//! Loads env config, installs tracing + Prometheus, and serves the Axum router.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quake_relay::metrics::Metrics;
use quake_relay::RelayConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quake_relay=info,tower_http=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::from_env().context("reading configuration")?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m.handle),
        Err(e) => {
            warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let app = quake_relay::app(&cfg, metrics)?;

    let listener = TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .with_context(|| format!("binding port {}", cfg.port))?;
    info!(
        port = cfg.port,
        primary = %cfg.primary_url,
        fallback = %cfg.fallback_url,
        "server running"
    );
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
