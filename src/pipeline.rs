//! # Quake Pipeline
//! Per-request cascade: primary source, then fallback, then a terminal error.
//!
//! Policy: any primary failure (transport, timeout, non-2xx, or zero parsed
//! rows) engages the fallback exactly once. A success always carries at least
//! one record; there is no retry loop, clients poll.

use std::sync::Arc;

use metrics::counter;
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::ingest::types::{EarthquakeRecord, Feed, FetchWindow, SourceError, SourceProvider};
use crate::ingest::{ensure_metrics_described, normalize};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("all sources failed (primary: {primary}; fallback: {fallback})")]
    AllSourcesFailed {
        primary: SourceError,
        fallback: SourceError,
    },
}

#[derive(Clone)]
pub struct QuakePipeline {
    primary: Arc<dyn SourceProvider>,
    fallback: Arc<dyn SourceProvider>,
    clock: Arc<dyn Clock>,
}

impl QuakePipeline {
    pub fn new(primary: Arc<dyn SourceProvider>, fallback: Arc<dyn SourceProvider>) -> Self {
        Self {
            primary,
            fallback,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve one request: newest `limit` records from the first source that
    /// delivers any.
    pub async fn run(&self, limit: usize, feed: Feed) -> Result<Vec<EarthquakeRecord>, PipelineError> {
        ensure_metrics_described();
        let window = FetchWindow::ending_at(self.clock.now(), feed);

        info!(source = self.primary.name(), limit, ?feed, "fetching primary");

        let primary_err = match attempt(self.primary.as_ref(), window).await {
            Ok(records) => {
                info!(source = self.primary.name(), records = records.len(), "primary ok");
                return Ok(normalize(records, limit));
            }
            Err(e) => e,
        };
        warn!(
            source = self.primary.name(),
            kind = primary_err.kind(),
            error = %primary_err,
            "primary failed, using fallback"
        );
        counter!("quake_fallback_total").increment(1);

        match attempt(self.fallback.as_ref(), window).await {
            Ok(records) => {
                info!(source = self.fallback.name(), records = records.len(), "fallback ok");
                Ok(normalize(records, limit))
            }
            Err(fallback_err) => {
                error!(
                    primary = %primary_err,
                    fallback = %fallback_err,
                    "both earthquake sources failed"
                );
                counter!("quake_pipeline_failures_total").increment(1);
                Err(PipelineError::AllSourcesFailed {
                    primary: primary_err,
                    fallback: fallback_err,
                })
            }
        }
    }
}

/// One cascade step. Zero records counts as a failure so that a broken page
/// is never mistaken for a quiet day.
async fn attempt(
    provider: &dyn SourceProvider,
    window: FetchWindow,
) -> Result<Vec<EarthquakeRecord>, SourceError> {
    let res = match provider.fetch_latest(window).await {
        Ok(records) if records.is_empty() => Err(SourceError::EmptyResult),
        other => other,
    };
    if let Err(e) = &res {
        counter!(
            "quake_source_failures_total",
            "source" => provider.name(),
            "kind" => e.kind()
        )
        .increment(1);
    }
    res
}
