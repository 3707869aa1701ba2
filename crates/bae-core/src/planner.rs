//! Granule Planner: expands a dataset's acquisition window into the ordered
//! list of `(date, hour)` pairs to fetch.
//!
//! Grounded on `batch_scheduler.py::_generate_granules`: walk each calendar
//! day in `[date_start, date_end]`, keep the day if its weekday is in
//! `weekday_mask`, and emit one skeleton per hour in `hours` for that day.

use chrono::{Datelike, NaiveDate};

use crate::geo::BoundingBox;
use crate::model::{AcquisitionFilters, DatasetId, Granule};

/// One planned `(date, hour)` fetch, not yet persisted or downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedGranule {
    pub date: NaiveDate,
    pub hour: u32,
}

/// Expands a window into ordered `(date, hour)` pairs, days first then
/// hours within each day, matching the original's nested-loop order.
pub fn plan_granules(
    date_start: NaiveDate,
    date_end: NaiveDate,
    weekday_mask: &[u8],
    hours: &[u32],
) -> Vec<PlannedGranule> {
    let mut planned = Vec::new();
    let mut current = date_start;
    while current <= date_end {
        if weekday_mask.contains(&(current.weekday().num_days_from_monday() as u8)) {
            for &hour in hours {
                planned.push(PlannedGranule { date: current, hour });
            }
        }
        current = current.succ_opt().expect("date range bounded by date_end");
    }
    planned
}

/// Turns planned skeletons into `Granule` rows ready for
/// `Store::create_granules_batch`, computing each one's content hash
/// (`spec.md` §4.1 `findGranuleByHash` relies on this being stable).
pub fn granules_for_dataset(
    dataset_id: DatasetId,
    planned: &[PlannedGranule],
    bbox: BoundingBox,
    filters: AcquisitionFilters,
) -> Vec<Granule> {
    planned
        .iter()
        .map(|p| {
            let content_hash = crate::hash::content_hash(
                &bbox,
                &p.date.format("%Y-%m-%d").to_string(),
                p.hour,
                filters.max_cloud_fraction,
                filters.max_solar_zenith_angle,
            );
            Granule {
                id: 0,
                dataset_id,
                date: p.date,
                hour: p.hour,
                bbox,
                max_cloud_fraction: filters.max_cloud_fraction,
                max_solar_zenith_angle: filters.max_solar_zenith_angle,
                downloaded: false,
                downloaded_at: None,
                content_hash,
                no2_valid_pixels: None,
                no2_mean: None,
                hcho_valid_pixels: None,
                hcho_mean: None,
                o3_valid_pixels: None,
                o3_mean: None,
                file_path: None,
                file_size_bytes: None,
            }
        })
        .collect()
}
