// src/ingest/providers/usgs.rs
//! USGS FDSN event service (GeoJSON), used when PHIVOLCS is unavailable.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::ingest::fetch::{BoundedFetcher, FetchOptions};
use crate::ingest::manila_offset;
use crate::ingest::types::{
    EarthquakeRecord, FetchWindow, QuakeSource, SourceError, SourceProvider,
};

pub const DEFAULT_USGS_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";
pub const DEFAULT_MIN_MAGNITUDE: f64 = 1.0;

/// Region filter for the query, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Default for BoundingBox {
    /// The Philippine area of responsibility, roughly.
    fn default() -> Self {
        Self {
            min_latitude: 4.0,
            max_latitude: 21.0,
            min_longitude: 116.0,
            max_longitude: 127.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    time: Option<i64>,
    mag: Option<f64>,
    place: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

/// Query parameters for one fallback request.
pub fn query_options(window: &FetchWindow, region: &BoundingBox, min_magnitude: f64) -> FetchOptions {
    FetchOptions::new()
        .query("format", "geojson")
        .query(
            "starttime",
            window.start.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .query("minlatitude", region.min_latitude)
        .query("maxlatitude", region.max_latitude)
        .query("minlongitude", region.min_longitude)
        .query("maxlongitude", region.max_longitude)
        .query("minmagnitude", min_magnitude)
}

/// Map a GeoJSON body onto records.
///
/// `coordinates` is `[lon, lat, depth_km]`; missing entries and a null `mag`
/// read as `0.0`, a missing `place` as `"Unknown"`. Times are shown in
/// Philippine time (`10/19/2025, 2:13:00 PM`).
pub fn adapt(body: &str) -> Result<Vec<EarthquakeRecord>, SourceError> {
    let fc: FeatureCollection =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(format!("usgs geojson: {e}")))?;
    Ok(fc.features.into_iter().map(record_from_feature).collect())
}

fn record_from_feature(f: Feature) -> EarthquakeRecord {
    let coords = f.geometry.map(|g| g.coordinates).unwrap_or_default();
    let coord = |i: usize| coords.get(i).copied().filter(|v| v.is_finite()).unwrap_or(0.0);

    let event_time = f
        .properties
        .time
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.with_timezone(&manila_offset()));
    let datetime = event_time
        .map(|t| t.format("%m/%d/%Y, %-I:%M:%S %p").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let location = f
        .properties
        .place
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    EarthquakeRecord {
        datetime,
        latitude: coord(1),
        longitude: coord(0),
        depth: format!("{} km", coord(2)),
        magnitude: f.properties.mag.filter(|m| m.is_finite()).unwrap_or(0.0),
        location,
        source: QuakeSource::Fallback,
        event_time,
    }
}

pub struct UsgsProvider {
    fetcher: BoundedFetcher,
    url: String,
    timeout: Duration,
    region: BoundingBox,
    min_magnitude: f64,
}

impl UsgsProvider {
    pub fn new(fetcher: BoundedFetcher, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            url: url.into(),
            timeout,
            region: BoundingBox::default(),
            min_magnitude: DEFAULT_MIN_MAGNITUDE,
        }
    }

    pub fn with_region(mut self, region: BoundingBox, min_magnitude: f64) -> Self {
        self.region = region;
        self.min_magnitude = min_magnitude;
        self
    }
}

#[async_trait]
impl SourceProvider for UsgsProvider {
    async fn fetch_latest(&self, window: FetchWindow) -> Result<Vec<EarthquakeRecord>, SourceError> {
        let opts = query_options(&window, &self.region, self.min_magnitude);

        let t0 = Instant::now();
        let page = self.fetcher.fetch(&self.url, &opts, self.timeout).await;
        histogram!("quake_fetch_ms", "source" => "usgs")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        let page = page?;

        let records = adapt(&page.body)?;
        counter!("quake_records_parsed_total", "source" => "usgs").increment(records.len() as u64);
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "USGS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Feed;
    use chrono::{TimeZone, Utc};

    #[test]
    fn query_carries_region_magnitude_and_iso_start() {
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 6, 0, 0).unwrap();
        let window = FetchWindow::ending_at(now, Feed::Day);
        let opts = query_options(&window, &BoundingBox::default(), 1.0);
        let get = |k: &str| {
            opts.query
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("format"), Some("geojson"));
        assert_eq!(get("starttime"), Some("2025-10-18T06:00:00.000Z"));
        assert_eq!(get("minlatitude"), Some("4"));
        assert_eq!(get("maxlatitude"), Some("21"));
        assert_eq!(get("minlongitude"), Some("116"));
        assert_eq!(get("maxlongitude"), Some("127"));
        assert_eq!(get("minmagnitude"), Some("1"));
    }

    #[test]
    fn feature_maps_lon_lat_depth() {
        let body = r#"{"type":"FeatureCollection","features":[
            {"properties":{"time":1760854380000,"mag":4.6,"place":"12 km SW of Somewhere"},
             "geometry":{"type":"Point","coordinates":[125.5,9.75,10.5]}}
        ]}"#;
        let out = adapt(body).unwrap();
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.latitude, 9.75);
        assert_eq!(r.longitude, 125.5);
        assert_eq!(r.depth, "10.5 km");
        assert_eq!(r.magnitude, 4.6);
        assert_eq!(r.location, "12 km SW of Somewhere");
        assert_eq!(r.source, QuakeSource::Fallback);
        // 2025-10-19T06:13:00Z is 2:13 PM in Manila
        assert_eq!(r.datetime, "10/19/2025, 2:13:00 PM");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let body = r#"{"features":[
            {"properties":{"time":null,"mag":null,"place":null},"geometry":{"coordinates":[120.0,15.0]}}
        ]}"#;
        let r = &adapt(body).unwrap()[0];
        assert_eq!(r.magnitude, 0.0);
        assert_eq!(r.location, "Unknown");
        assert_eq!(r.depth, "0 km");
        assert_eq!(r.datetime, "Unknown");
        assert!(r.event_time.is_none());
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let err = adapt("<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }
}
