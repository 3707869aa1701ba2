use super::job::JobId;
use super::AcquisitionFilters;
use crate::geo::BoundingBox;

pub type DatasetId = i64;

/// `spec.md` §3/§5.3 Dataset state machine: `PENDING -> DOWNLOADING ->
/// {PARTIAL | COMPLETE | ERROR}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    Pending,
    Downloading,
    Partial,
    Complete,
    Error,
}

impl DatasetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetStatus::Pending => "pending",
            DatasetStatus::Downloading => "downloading",
            DatasetStatus::Partial => "partial",
            DatasetStatus::Complete => "complete",
            DatasetStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => DatasetStatus::Pending,
            "downloading" => DatasetStatus::Downloading,
            "partial" => DatasetStatus::Partial,
            "complete" => DatasetStatus::Complete,
            _ => DatasetStatus::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub job_id: Option<JobId>,
    pub created_at: chrono::NaiveDateTime,
    pub bbox: BoundingBox,
    pub date_start: chrono::NaiveDate,
    pub date_end: chrono::NaiveDate,
    pub weekday_mask: Vec<u8>,
    pub hours: Vec<u32>,
    pub filters: AcquisitionFilters,
    pub status: DatasetStatus,
    pub file_path: Option<String>,
    pub file_size_bytes: Option<i64>,
    /// `models.py`'s `file_hash`: opaque checksum of the combined artifact,
    /// unused by the engine's own control flow (see `SPEC_FULL.md` §3).
    pub file_hash: Option<String>,
    pub last_accessed_at: Option<chrono::NaiveDateTime>,
    pub planned_granule_count: i64,
    pub downloaded_granule_count: i64,
    /// `models.py`'s `selected_variables`: opaque passthrough for the
    /// export/chart subsystems (see `SPEC_FULL.md` §3). The engine never
    /// reads this field, only round-trips it.
    pub selected_variables: Option<Vec<String>>,
}

impl Dataset {
    /// `downloaded <= planned` (`spec.md` §3 Dataset invariant).
    pub fn counts_valid(&self) -> bool {
        self.downloaded_granule_count <= self.planned_granule_count
    }
}
