// src/ingest/mod.rs
pub mod fetch;
pub mod providers;
pub mod types;

use std::cmp::Ordering;

use chrono::FixedOffset;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::EarthquakeRecord;

/// Limit for the "latest" endpoint.
pub const LATEST_LIMIT: usize = 10;
/// Limit for the bulk endpoint.
pub const BULK_LIMIT: usize = 50;

/// Philippine Standard Time, UTC+8 with no DST.
pub fn manila_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("quake_requests_total", "Inbound quake API requests.");
        describe_counter!(
            "quake_source_failures_total",
            "Cascade steps that failed, by source and error kind."
        );
        describe_counter!("quake_fallback_total", "Requests answered via the fallback source.");
        describe_counter!(
            "quake_pipeline_failures_total",
            "Requests where every source failed."
        );
        describe_counter!("quake_records_parsed_total", "Records produced by providers.");
        describe_histogram!("quake_fetch_ms", "Upstream fetch time in milliseconds.");
    });
}

/// Newest first, then truncate to `limit`.
///
/// Records without a parseable event time go last; ties keep their input
/// order (the sort is stable).
pub fn normalize(mut records: Vec<EarthquakeRecord>, limit: usize) -> Vec<EarthquakeRecord> {
    records.sort_by(|a, b| match (a.event_time, b.event_time) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    records.truncate(limit);
    records
}
