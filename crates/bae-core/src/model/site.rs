use super::job::JobId;
use super::{dataset::DatasetId, AcquisitionFilters};
use crate::geo::BoundingBox;

pub type SiteId = i64;

/// `spec.md` §3/§5.1 BatchSite state machine:
/// `PENDING -> QUEUED -> DOWNLOADING -> PROCESSING -> {COMPLETED | ERROR}`;
/// Recovery collapses `{QUEUED, DOWNLOADING, PROCESSING} -> PENDING`.
/// `SKIPPED` is set externally and is also terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSiteStatus {
    Pending,
    Queued,
    Downloading,
    Processing,
    Completed,
    Error,
    Skipped,
}

impl BatchSiteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchSiteStatus::Pending => "pending",
            BatchSiteStatus::Queued => "queued",
            BatchSiteStatus::Downloading => "downloading",
            BatchSiteStatus::Processing => "processing",
            BatchSiteStatus::Completed => "completed",
            BatchSiteStatus::Error => "error",
            BatchSiteStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => BatchSiteStatus::Pending,
            "queued" => BatchSiteStatus::Queued,
            "downloading" => BatchSiteStatus::Downloading,
            "processing" => BatchSiteStatus::Processing,
            "completed" => BatchSiteStatus::Completed,
            "skipped" => BatchSiteStatus::Skipped,
            _ => BatchSiteStatus::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchSiteStatus::Completed | BatchSiteStatus::Error | BatchSiteStatus::Skipped
        )
    }

    /// The set Recovery resets to `PENDING` (`spec.md` §4.1 `resetInterruptedSites`).
    pub fn is_interrupted(self) -> bool {
        matches!(
            self,
            BatchSiteStatus::Queued | BatchSiteStatus::Downloading | BatchSiteStatus::Processing
        )
    }
}

/// Optional per-site overrides of the job's default acquisition window and
/// filters; `None` fields fall back to the job default (`spec.md` §3).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SiteOverrides {
    pub date_start: Option<chrono::NaiveDate>,
    pub date_end: Option<chrono::NaiveDate>,
    pub hour_start: Option<u32>,
    pub hour_end: Option<u32>,
    pub max_cloud_fraction: Option<f64>,
    pub max_solar_zenith_angle: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BatchSite {
    pub id: SiteId,
    pub job_id: JobId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
    pub bbox: BoundingBox,
    pub status: BatchSiteStatus,
    pub dataset_id: Option<DatasetId>,
    pub error_message: Option<String>,
    pub started_at: Option<chrono::NaiveDateTime>,
    pub finished_at: Option<chrono::NaiveDateTime>,
    pub sequence_number: i64,
    pub overrides: SiteOverrides,
}

impl SiteOverrides {
    /// Merge this site's overrides over a job's defaults, field by field.
    pub fn resolve(
        &self,
        job_date_start: chrono::NaiveDate,
        job_date_end: chrono::NaiveDate,
        job_hours: &[u32],
        job_filters: AcquisitionFilters,
    ) -> (chrono::NaiveDate, chrono::NaiveDate, Vec<u32>, AcquisitionFilters) {
        let date_start = self.date_start.unwrap_or(job_date_start);
        let date_end = self.date_end.unwrap_or(job_date_end);
        let hours = match (self.hour_start, self.hour_end) {
            (Some(start), Some(end)) if start <= end => (start..=end).collect(),
            _ => job_hours.to_vec(),
        };
        let filters = AcquisitionFilters {
            max_cloud_fraction: self
                .max_cloud_fraction
                .unwrap_or(job_filters.max_cloud_fraction),
            max_solar_zenith_angle: self
                .max_solar_zenith_angle
                .unwrap_or(job_filters.max_solar_zenith_angle),
        };
        (date_start, date_end, hours, filters)
    }
}
