//! Content-hash deduplication key for a planned granule fetch.
//!
//! The digest is computed over a canonical JSON encoding of the request
//! parameters with keys in sorted order, so that floating-point formatting
//! differences never produce a false-distinct hash for the same request.
//! Rounding (4 dp for cloud fraction, 2 dp for solar zenith angle) happens
//! before serialization, not after, so two requests that differ only in
//! float noise below that precision hash identically.

use crate::geo::BoundingBox;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const GRID_KW: &str = "1US1";

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Compute the content hash for a planned granule fetch.
///
/// `date` must already be an ISO-8601 `YYYY-MM-DD` string — callers hold a
/// `chrono::NaiveDate` and format it before calling in, so this function
/// stays free of a chrono dependency.
pub fn content_hash(
    bbox: &BoundingBox,
    date: &str,
    hour: u32,
    max_cloud_fraction: f64,
    max_solar_zenith_angle: f64,
) -> String {
    // BTreeMap<&str, _> serializes keys in sorted order, matching Python's
    // `json.dumps(..., sort_keys=True)`: bbox, date, grid_kw, hour,
    // max_cloud_fraction, max_solar_zenith_angle.
    let mut map: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    map.insert(
        "bbox",
        serde_json::json!([bbox.west, bbox.south, bbox.east, bbox.north]),
    );
    map.insert("date", serde_json::json!(date));
    map.insert("grid_kw", serde_json::json!(GRID_KW));
    map.insert("hour", serde_json::json!(hour));
    map.insert(
        "max_cloud_fraction",
        serde_json::json!(round_to(max_cloud_fraction, 4)),
    );
    map.insert(
        "max_solar_zenith_angle",
        serde_json::json!(round_to(max_solar_zenith_angle, 2)),
    );

    let canonical = serde_json::to_string(&map).expect("BTreeMap<&str, Value> always serializes");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
