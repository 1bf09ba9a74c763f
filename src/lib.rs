// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod pipeline;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

pub use crate::api::{router, AppState};
pub use crate::config::RelayConfig;
pub use crate::ingest::types::{EarthquakeRecord, Feed, FetchWindow, QuakeSource, SourceError};
pub use crate::pipeline::{PipelineError, QuakePipeline};

use crate::clock::{Clock, SystemClock};
use crate::ingest::fetch::BoundedFetcher;
use crate::ingest::providers::{PhivolcsProvider, UsgsProvider};

/// Build the pipeline with real PHIVOLCS/USGS providers from `cfg`.
pub fn build_pipeline(cfg: &RelayConfig, clock: Arc<dyn Clock>) -> anyhow::Result<QuakePipeline> {
    let fetcher =
        BoundedFetcher::new(cfg.insecure_tls_hosts.clone()).context("building http clients")?;
    let primary = PhivolcsProvider::new(
        fetcher.clone(),
        &cfg.primary_url,
        cfg.fetch_timeout,
        clock.clone(),
    );
    let fallback = UsgsProvider::new(fetcher, &cfg.fallback_url, cfg.fetch_timeout)
        .with_region(cfg.region, cfg.min_magnitude);
    Ok(QuakePipeline::new(Arc::new(primary), Arc::new(fallback)).with_clock(clock))
}

/// The complete Router the binary serves.
pub fn app(cfg: &RelayConfig, metrics: Option<PrometheusHandle>) -> anyhow::Result<Router> {
    let pipeline = build_pipeline(cfg, Arc::new(SystemClock))?;
    let state = AppState { pipeline, metrics };
    Ok(router(state, &cfg.allowed_origins, &cfg.static_dir))
}
