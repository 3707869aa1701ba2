//! Entity types persisted by the Store: jobs, sites, datasets, granules.

mod dataset;
mod export;
mod granule;
mod job;
mod site;

pub use dataset::{Dataset, DatasetId, DatasetStatus};
pub use export::ExportRecord;
pub use granule::Granule;
pub use job::{BatchJob, BatchJobStatus, JobId};
pub use site::{BatchSite, BatchSiteStatus, SiteId, SiteOverrides};

/// Filter parameters shared by a job, a site's effective overrides, and a
/// planned granule — kept as one struct so "resolve effective parameters"
/// (`spec.md` §4.7 step c) is a single field-by-field merge.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AcquisitionFilters {
    pub max_cloud_fraction: f64,
    pub max_solar_zenith_angle: f64,
}

/// A calendar-day window plus an hour-of-day list, the shape the Granule
/// Planner expands into individual requests.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AcquisitionWindow {
    pub date_start: chrono::NaiveDate,
    pub date_end: chrono::NaiveDate,
    /// 0 = Monday .. 6 = Sunday, matching `chrono::Weekday::num_days_from_monday`.
    pub weekday_mask: Vec<u8>,
    pub hours: Vec<u32>,
}
