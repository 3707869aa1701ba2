//! Column-name aliases for flexible site-list headers, ported directly from
//! `batch_parser.py`'s `COLUMN_ALIASES` plus its ad-hoc optional-column
//! alias lists.

pub(super) const NAME_ALIASES: &[&str] = &["name", "site_name", "site", "location", "id", "site_id"];
pub(super) const LATITUDE_ALIASES: &[&str] = &["latitude", "lat", "y", "lat_dd"];
pub(super) const LONGITUDE_ALIASES: &[&str] = &["longitude", "lon", "long", "x", "lng", "lon_dd"];
pub(super) const RADIUS_ALIASES: &[&str] = &["radius_km", "radius", "radius (km)"];
pub(super) const DATE_START_ALIASES: &[&str] = &["date_start", "start_date"];
pub(super) const DATE_END_ALIASES: &[&str] = &["date_end", "end_date"];
pub(super) const HOUR_START_ALIASES: &[&str] = &["hour_start", "time_start", "start_hour"];
pub(super) const HOUR_END_ALIASES: &[&str] = &["hour_end", "time_end", "end_hour"];
pub(super) const MAX_CLOUD_ALIASES: &[&str] = &["max_cloud", "cloud_fraction", "cloud"];
pub(super) const MAX_SZA_ALIASES: &[&str] = &["max_sza", "sza", "solar_zenith"];

/// Returns the first alias present among `headers` (already lowercased and
/// trimmed), or `None` if none match.
pub(super) fn find_column(headers: &[String], candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|alias| headers.iter().any(|h| h == *alias))
        .map(|alias| alias.to_string())
}
