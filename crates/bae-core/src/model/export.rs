use super::dataset::DatasetId;

/// Ambient row the export subsystem (out of scope) would write into; the
/// engine owns the table only so `deleteJobFull`'s cascade has something to
/// cascade through (`SPEC_FULL.md` §3).
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub id: i64,
    pub dataset_id: DatasetId,
    pub format: String,
    pub file_path: String,
    pub created_at: chrono::NaiveDateTime,
    pub file_size_bytes: Option<i64>,
}
