// src/ingest/providers/phivolcs.rs
//! PHIVOLCS HTML scraper.
//!
//! The page layout is not versioned, so extraction is a pure function over the
//! parsed document that validates every row and skips what it cannot read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use scraper::{ElementRef, Html, Selector};

use crate::clock::Clock;
use crate::ingest::fetch::{BoundedFetcher, FetchOptions};
use crate::ingest::manila_offset;
use crate::ingest::types::{
    EarthquakeRecord, FetchWindow, QuakeSource, SourceError, SourceProvider,
};

pub const DEFAULT_PHIVOLCS_URL: &str = "https://earthquake.phivolcs.dost.gov.ph/";

/// Cells per data row: time, lat, lon, depth, magnitude, location.
const ROW_CELLS: usize = 6;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_TZ_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\b(?:PST|PHT|UTC|GMT)\.?$").expect("tz regex"));
static RE_LEADING_NUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("number regex")
});

const TIME_FORMATS: &[&str] = &[
    "%d %B %Y - %I:%M %p",
    "%d %b %Y - %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y, %I:%M:%S %p",
];

/// Map every well-formed table row in `html` to a record.
///
/// Rows with fewer than six `<td>` cells are skipped. Latitude, longitude and
/// magnitude use [`parse_lenient_f64`], so unreadable numbers come back as
/// `0.0`. A document without a usable table yields an empty vector; deciding
/// whether that is a failure is up to the caller.
pub fn extract(html: &str) -> Vec<EarthquakeRecord> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    for table in doc.select(&TABLE) {
        for row in data_rows(table) {
            let cells = td_texts(row);
            if cells.len() < ROW_CELLS {
                continue;
            }
            out.push(record_from_cells(&cells));
        }
    }
    out
}

/// Body rows of one table (nested tables are visited separately).
///
/// Without a header marker (`<thead>` or a leading row of `<th>` cells) the
/// first row is taken to be the header and dropped by position.
fn data_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut has_thead = false;
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "thead" => has_thead = true,
            "tbody" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            "tr" => rows.push(child),
            _ => {}
        }
    }

    let first_is_th = rows.first().is_some_and(|r| {
        r.children()
            .filter_map(ElementRef::wrap)
            .any(|c| c.value().name() == "th")
    });
    if !has_thead && !first_is_th && !rows.is_empty() {
        rows.remove(0);
    }
    rows
}

fn td_texts(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| c.value().name() == "td")
        .map(|c| clean_text(&c.text().collect::<String>()))
        .collect()
}

/// Trim and collapse inner whitespace runs (cells wrap across source lines).
fn clean_text(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

fn record_from_cells(cells: &[String]) -> EarthquakeRecord {
    let datetime = strip_tz_suffix(&cells[0]);
    let event_time = parse_event_time(&datetime);
    let location = if cells[5].is_empty() {
        "Unknown".to_string()
    } else {
        cells[5].clone()
    };
    EarthquakeRecord {
        datetime,
        latitude: parse_lenient_f64(&cells[1]),
        longitude: parse_lenient_f64(&cells[2]),
        depth: cells[3].clone(),
        magnitude: parse_lenient_f64(&cells[4]),
        location,
        source: QuakeSource::Primary,
        event_time,
    }
}

/// Drop a trailing timezone abbreviation such as `PST`.
pub fn strip_tz_suffix(s: &str) -> String {
    RE_TZ_SUFFIX.replace(s.trim(), "").trim().to_string()
}

/// Read the longest leading decimal literal (`"14.52°N"` -> 14.52).
/// Anything unreadable or non-finite is `0.0`.
pub fn parse_lenient_f64(s: &str) -> f64 {
    RE_LEADING_NUM
        .find(s.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a PHIVOLCS timestamp as Philippine time.
pub fn parse_event_time(s: &str) -> Option<DateTime<FixedOffset>> {
    TIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .and_then(|naive| manila_offset().from_local_datetime(&naive).single())
    })
}

pub struct PhivolcsProvider {
    fetcher: BoundedFetcher,
    url: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl PhivolcsProvider {
    pub fn new(
        fetcher: BoundedFetcher,
        url: impl Into<String>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            url: url.into(),
            timeout,
            clock,
        }
    }
}

#[async_trait]
impl SourceProvider for PhivolcsProvider {
    /// The page always lists the latest events, so the window is unused.
    async fn fetch_latest(&self, _window: FetchWindow) -> Result<Vec<EarthquakeRecord>, SourceError> {
        // Cache-busting query plus no-cache headers to get past intermediaries.
        let opts = FetchOptions::new()
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .query("t", self.clock.now().timestamp_millis());

        let t0 = Instant::now();
        let page = self.fetcher.fetch(&self.url, &opts, self.timeout).await;
        histogram!("quake_fetch_ms", "source" => "phivolcs")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        let page = page?;

        let records = extract(&page.body);
        counter!("quake_records_parsed_total", "source" => "phivolcs")
            .increment(records.len() as u64);
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "PHIVOLCS"
    }
}
