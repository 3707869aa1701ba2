//! Concrete shape of the remote granule service's request interface.
//!
//! `spec.md` §6 specifies the service only as an abstract
//! `fetch(productId, bboxOrGrid, bdate, edate, filters{cloud, sza, quality},
//! apiKey)` call and explicitly puts the wire format out of scope. This
//! module picks one concrete, testable encoding of that interface — a single
//! GET with the parameters as a query string — so the Batch Scheduler has
//! something real to hand to `fetch::fetch_granule`.

use chrono::NaiveDate;

use crate::geo::BoundingBox;
use crate::model::AcquisitionFilters;

/// Builds the request URL for one `(date, hour)` granule against `base_url`.
pub fn granule_request_url(
    base_url: &str,
    bbox: &BoundingBox,
    date: NaiveDate,
    hour: u32,
    filters: AcquisitionFilters,
    api_key: &str,
) -> String {
    let mut url = format!(
        "{base_url}?bbox={:.6},{:.6},{:.6},{:.6}&date={}&hour={:02}&max_cloud={}&max_sza={}",
        bbox.west,
        bbox.south,
        bbox.east,
        bbox.north,
        date.format("%Y-%m-%d"),
        hour,
        filters.max_cloud_fraction,
        filters.max_solar_zenith_angle,
    );
    if !api_key.is_empty() {
        url.push_str("&api_key=");
        url.push_str(api_key);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_string_with_filters() {
        let bbox = BoundingBox {
            west: -111.1,
            south: 39.9,
            east: -110.9,
            north: 40.1,
        };
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let filters = AcquisitionFilters {
            max_cloud_fraction: 0.5,
            max_solar_zenith_angle: 70.0,
        };
        let url = granule_request_url("https://svc.invalid/api", &bbox, date, 16, filters, "");
        assert!(url.starts_with("https://svc.invalid/api?bbox=-111.100000,39.900000,-110.900000,40.100000"));
        assert!(url.contains("date=2024-06-01"));
        assert!(url.contains("hour=16"));
        assert!(!url.contains("api_key"));
    }

    #[test]
    fn appends_api_key_when_present() {
        let bbox = BoundingBox {
            west: 0.0,
            south: 0.0,
            east: 1.0,
            north: 1.0,
        };
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let filters = AcquisitionFilters {
            max_cloud_fraction: 0.3,
            max_solar_zenith_angle: 60.0,
        };
        let url = granule_request_url("https://svc.invalid/api", &bbox, date, 5, filters, "abc123");
        assert!(url.ends_with("&api_key=abc123"));
    }
}
