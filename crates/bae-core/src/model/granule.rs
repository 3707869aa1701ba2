use super::dataset::DatasetId;
use crate::geo::BoundingBox;

/// One planned or completed (date, hour) fetch for a dataset. The tuple
/// `(dataset_id, date, hour)` is unique (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Granule {
    pub id: i64,
    pub dataset_id: DatasetId,
    pub date: chrono::NaiveDate,
    pub hour: u32,
    /// Copy of the filter parameters used for this exact fetch — part of
    /// the content identity, not a foreign-key convenience (`spec.md` §3).
    pub bbox: BoundingBox,
    pub max_cloud_fraction: f64,
    pub max_solar_zenith_angle: f64,
    pub downloaded: bool,
    pub downloaded_at: Option<chrono::NaiveDateTime>,
    pub content_hash: String,
    /// Per-variable quality summary (`spec.md` §3: "per-variable valid-pixel
    /// counts and means"), one pair per product variable the remote service
    /// returns for a granule.
    pub no2_valid_pixels: Option<i64>,
    pub no2_mean: Option<f64>,
    pub hcho_valid_pixels: Option<i64>,
    pub hcho_mean: Option<f64>,
    pub o3_valid_pixels: Option<i64>,
    pub o3_mean: Option<f64>,
    pub file_path: Option<String>,
    pub file_size_bytes: Option<i64>,
}
