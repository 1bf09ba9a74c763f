// src/ingest/types.rs
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

use crate::ingest::fetch::FetchError;

/// Where a record came from. Serialized with the upstream names the UI already
/// understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuakeSource {
    #[serde(rename = "PHIVOLCS")]
    Primary,
    #[serde(rename = "USGS")]
    Fallback,
}

impl QuakeSource {
    pub fn label(self) -> &'static str {
        match self {
            QuakeSource::Primary => "phivolcs",
            QuakeSource::Fallback => "usgs",
        }
    }
}

/// One earthquake, as returned to clients.
///
/// Numeric fields are lossy by policy: a value that cannot be read from the
/// upstream is reported as `0.0` instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarthquakeRecord {
    pub datetime: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: String,
    pub magnitude: f64,
    pub location: String,
    pub source: QuakeSource,
    /// Parsed `datetime`, used for ordering only.
    #[serde(skip)]
    pub event_time: Option<DateTime<FixedOffset>>,
}

/// Size of the fallback time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    Hour,
    #[default]
    Day,
    Week,
}

impl Feed {
    /// Accepts the USGS feed names (`all_hour`, ...) and their short forms.
    /// Anything unknown selects the default day window.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("all_hour") | Some("hour") => Feed::Hour,
            Some("all_week") | Some("week") => Feed::Week,
            _ => Feed::Day,
        }
    }

    pub fn span(self) -> Duration {
        match self {
            Feed::Hour => Duration::hours(1),
            Feed::Day => Duration::days(1),
            Feed::Week => Duration::weeks(1),
        }
    }
}

/// `{now - span, now}` for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn ending_at(now: DateTime<Utc>, feed: Feed) -> Self {
        Self {
            start: now - feed.span(),
            end: now,
        }
    }
}

/// Why a single cascade step failed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no earthquake rows found")]
    EmptyResult,
    #[error("malformed response body: {0}")]
    Parse(String),
}

impl SourceError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch(e) => e.kind(),
            SourceError::EmptyResult => "empty",
            SourceError::Parse(_) => "parse",
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self, window: FetchWindow) -> Result<Vec<EarthquakeRecord>, SourceError>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn feed_parse_accepts_usgs_names_and_defaults_to_day() {
        assert_eq!(Feed::parse(Some("all_hour")), Feed::Hour);
        assert_eq!(Feed::parse(Some("WEEK")), Feed::Week);
        assert_eq!(Feed::parse(Some("all_month")), Feed::Day);
        assert_eq!(Feed::parse(None), Feed::Day);
    }

    #[test]
    fn window_spans_the_feed_size() {
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap();
        let w = FetchWindow::ending_at(now, Feed::Week);
        assert_eq!(w.end, now);
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 10, 12, 12, 0, 0).unwrap());
    }

    #[test]
    fn source_serializes_with_upstream_names() {
        assert_eq!(serde_json::to_string(&QuakeSource::Primary).unwrap(), r#""PHIVOLCS""#);
        assert_eq!(serde_json::to_string(&QuakeSource::Fallback).unwrap(), r#""USGS""#);
    }
}
