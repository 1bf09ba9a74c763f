// tests/extract_phivolcs.rs
use quake_relay::ingest::normalize;
use quake_relay::ingest::providers::phivolcs::extract;
use quake_relay::QuakeSource;
use std::fs;

#[test]
fn two_valid_rows_and_one_malformed_row() {
    let html = r#"<html><body><table>
        <thead><tr><th>Date</th><th>Lat</th><th>Lon</th><th>Depth</th><th>Mag</th><th>Location</th></tr></thead>
        <tbody>
          <tr><td>19 October 2025 - 02:13 PM</td><td>9.75</td><td>126.12</td><td>010</td><td>2.3</td><td>Cagwait</td></tr>
          <tr><td>19 October 2025 - 01:02 PM</td><td>14.30</td><td>120.55</td><td>027</td><td></td><td>Calatagan</td></tr>
          <tr><td>19 October 2025 - 12:00 PM</td><td>11.0</td><td>124.7</td></tr>
        </tbody>
    </table></body></html>"#;

    let out = extract(html);
    assert_eq!(out.len(), 2, "malformed 3-cell row must be skipped");
    assert_eq!(out[0].magnitude, 2.3);
    assert_eq!(out[1].magnitude, 0.0, "blank magnitude reads as 0.0");
    assert_eq!(out[1].location, "Calatagan");
    assert!(out.iter().all(|r| r.source == QuakeSource::Primary));
}

#[test]
fn unparseable_numbers_are_zero_never_nan() {
    let html = r#"<table><thead><tr><th>h</th></tr></thead><tbody>
        <tr><td>19 October 2025 - 02:13 PM</td><td>--</td><td>NaN</td><td>n/a</td><td>abc</td><td>X</td></tr>
    </tbody></table>"#;
    let r = &extract(html)[0];
    assert_eq!(r.latitude, 0.0);
    assert_eq!(r.longitude, 0.0);
    assert_eq!(r.magnitude, 0.0);
    assert_eq!(r.depth, "n/a");

    let json = serde_json::to_string(r).unwrap();
    assert!(!json.contains("NaN") && !json.contains("null"), "{json}");
}

#[test]
fn fixture_page_yields_trimmed_records() {
    let html = fs::read_to_string("tests/fixtures/phivolcs.html")
        .expect("missing tests/fixtures/phivolcs.html");

    let out = extract(&html);
    // banner table row and the colspan advisory row are not data
    assert_eq!(out.len(), 3);

    let first = &out[0];
    assert_eq!(first.datetime, "19 October 2025 - 02:13 PM");
    assert_eq!(first.latitude, 9.75);
    assert_eq!(first.longitude, 126.12);
    assert_eq!(first.depth, "010");
    assert_eq!(first.location, "021 km N 45° E of Cagwait (Surigao Del Sur)");

    assert_eq!(out[2].datetime, "19 October 2025 - 05:45 PM", "tz suffix stripped");
    assert!(out.iter().all(|r| r.event_time.is_some()));
}

#[test]
fn fixture_page_normalizes_newest_first() {
    let html = fs::read_to_string("tests/fixtures/phivolcs.html").unwrap();
    let out = normalize(extract(&html), 2);
    let times: Vec<&str> = out.iter().map(|r| r.datetime.as_str()).collect();
    assert_eq!(
        times,
        vec!["19 October 2025 - 05:45 PM", "19 October 2025 - 02:13 PM"]
    );
}

#[test]
fn serialized_record_has_client_schema() {
    let html = fs::read_to_string("tests/fixtures/phivolcs.html").unwrap();
    let v = serde_json::to_value(&extract(&html)[0]).unwrap();
    let obj = v.as_object().unwrap();
    let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["datetime", "depth", "latitude", "location", "longitude", "magnitude", "source"]
    );
    assert_eq!(obj["source"], "PHIVOLCS");
}
