pub type JobId = i64;

/// `spec.md` §3 BatchJob state machine: `PENDING -> RUNNING -> {PAUSED |
/// COMPLETED | ERROR}`; `PAUSED`/`ERROR` -> `RUNNING` on resume; `COMPLETED`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchJobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Error,
}

impl BatchJobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchJobStatus::Pending => "pending",
            BatchJobStatus::Running => "running",
            BatchJobStatus::Paused => "paused",
            BatchJobStatus::Completed => "completed",
            BatchJobStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => BatchJobStatus::Pending,
            "running" => BatchJobStatus::Running,
            "paused" => BatchJobStatus::Paused,
            "completed" => BatchJobStatus::Completed,
            _ => BatchJobStatus::Error,
        }
    }

    /// Only `PAUSED`/`ERROR` jobs may be re-entered via `run()` (`spec.md` §3).
    pub fn is_resumable(self) -> bool {
        matches!(self, BatchJobStatus::Paused | BatchJobStatus::Error)
    }
}

use super::AcquisitionFilters;
use crate::geo::BoundingBox;

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: JobId,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
    pub status: BatchJobStatus,
    pub source_file: Option<String>,
    pub total_sites: i64,
    pub completed_sites: i64,
    pub failed_sites: i64,
    pub default_radius_km: f64,
    pub default_date_start: chrono::NaiveDate,
    pub default_date_end: chrono::NaiveDate,
    pub default_weekday_mask: Vec<u8>,
    pub default_hours: Vec<u32>,
    pub default_filters: AcquisitionFilters,
    pub batch_size: i64,
    pub last_processed_at: Option<chrono::NaiveDateTime>,
    pub error_message: Option<String>,
}

impl BatchJob {
    /// `completed + failed <= total` (`spec.md` §3 BatchJob invariant).
    pub fn counts_valid(&self) -> bool {
        self.completed_sites + self.failed_sites <= self.total_sites
    }

    pub fn is_done(&self) -> bool {
        self.completed_sites + self.failed_sites >= self.total_sites
    }
}

/// Effective per-site parameters after resolving overrides against job
/// defaults, field by field (`spec.md` §4.7 step c).
#[derive(Debug, Clone)]
pub struct EffectiveParams {
    pub bbox: BoundingBox,
    pub date_start: chrono::NaiveDate,
    pub date_end: chrono::NaiveDate,
    pub weekday_mask: Vec<u8>,
    pub hours: Vec<u32>,
    pub filters: AcquisitionFilters,
}
