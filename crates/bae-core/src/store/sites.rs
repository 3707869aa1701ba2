use anyhow::Result;
use sqlx::Row;

use super::codec::{date_to_text, datetime_to_text, text_to_date, text_to_datetime};
use super::Store;
use crate::geo::BoundingBox;
use crate::model::{BatchSite, BatchSiteStatus, JobId, SiteId, SiteOverrides};

impl Store {
    /// Inserts all rows atomically (`spec.md` §4.1 `createSitesBatch`).
    pub async fn create_sites_batch(&self, sites: &[BatchSite]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for site in sites {
            sqlx::query(
                r#"
                INSERT INTO batch_sites (
                    batch_job_id, site_name, latitude, longitude, radius_km,
                    bbox_west, bbox_south, bbox_east, bbox_north,
                    custom_date_start, custom_date_end, custom_hour_start, custom_hour_end,
                    custom_max_cloud_fraction, custom_max_solar_zenith_angle,
                    status, dataset_id, error_message, started_at, finished_at, sequence_number
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
                "#,
            )
            .bind(site.job_id)
            .bind(&site.name)
            .bind(site.lat)
            .bind(site.lon)
            .bind(site.radius_km)
            .bind(site.bbox.west)
            .bind(site.bbox.south)
            .bind(site.bbox.east)
            .bind(site.bbox.north)
            .bind(site.overrides.date_start.map(date_to_text))
            .bind(site.overrides.date_end.map(date_to_text))
            .bind(site.overrides.hour_start)
            .bind(site.overrides.hour_end)
            .bind(site.overrides.max_cloud_fraction)
            .bind(site.overrides.max_solar_zenith_angle)
            .bind(site.status.as_str())
            .bind(site.dataset_id)
            .bind(&site.error_message)
            .bind(site.started_at.map(datetime_to_text))
            .bind(site.finished_at.map(datetime_to_text))
            .bind(site.sequence_number)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_sites(&self, job_id: JobId) -> Result<Vec<BatchSite>> {
        let rows = sqlx::query("SELECT * FROM batch_sites WHERE batch_job_id = ?1 ORDER BY sequence_number")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_site).collect()
    }

    /// Sites with status in `{PENDING, QUEUED}` ordered by sequence number
    /// (`spec.md` §4.1 `getPendingSites`).
    pub async fn get_pending_sites(&self, job_id: JobId) -> Result<Vec<BatchSite>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM batch_sites
            WHERE batch_job_id = ?1 AND status IN ('pending', 'queued')
            ORDER BY sequence_number
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_site).collect()
    }

    pub async fn update_site(&self, site: &BatchSite) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_sites SET
                status = ?1, dataset_id = ?2, error_message = ?3,
                started_at = ?4, finished_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(site.status.as_str())
        .bind(site.dataset_id)
        .bind(&site.error_message)
        .bind(site.started_at.map(datetime_to_text))
        .bind(site.finished_at.map(datetime_to_text))
        .bind(site.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets `status := PENDING` and a fixed `error_message` for every site
    /// whose status ∈ `{QUEUED, DOWNLOADING, PROCESSING}` (`spec.md` §4.1
    /// `resetInterruptedSites`). Returns the count reset.
    ///
    /// Per `DESIGN.md`'s Open Question decision, the message is always
    /// overwritten, matching `reset_interrupted_batch_sites`.
    pub async fn reset_interrupted_sites(&self, job_id: JobId) -> Result<u64> {
        let r = sqlx::query(
            r#"
            UPDATE batch_sites SET
                status = 'pending',
                error_message = 'Interrupted by app restart'
            WHERE batch_job_id = ?1 AND status IN ('downloading', 'processing', 'queued')
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}

fn row_to_site(row: sqlx::sqlite::SqliteRow) -> Result<BatchSite> {
    let custom_date_start: Option<String> = row.get("custom_date_start");
    let custom_date_end: Option<String> = row.get("custom_date_end");
    let started_at: Option<String> = row.get("started_at");
    let finished_at: Option<String> = row.get("finished_at");

    Ok(BatchSite {
        id: row.get::<i64, _>("id") as SiteId,
        job_id: row.get("batch_job_id"),
        name: row.get("site_name"),
        lat: row.get("latitude"),
        lon: row.get("longitude"),
        radius_km: row.get("radius_km"),
        bbox: BoundingBox {
            west: row.get("bbox_west"),
            south: row.get("bbox_south"),
            east: row.get("bbox_east"),
            north: row.get("bbox_north"),
        },
        status: BatchSiteStatus::from_str(&row.get::<String, _>("status")),
        dataset_id: row.get("dataset_id"),
        error_message: row.get("error_message"),
        started_at: started_at.map(|s| text_to_datetime(&s)).transpose()?,
        finished_at: finished_at.map(|s| text_to_datetime(&s)).transpose()?,
        sequence_number: row.get("sequence_number"),
        overrides: SiteOverrides {
            date_start: custom_date_start.map(|s| text_to_date(&s)).transpose()?,
            date_end: custom_date_end.map(|s| text_to_date(&s)).transpose()?,
            hour_start: row.get::<Option<i64>, _>("custom_hour_start").map(|v| v as u32),
            hour_end: row.get::<Option<i64>, _>("custom_hour_end").map(|v| v as u32),
            max_cloud_fraction: row.get("custom_max_cloud_fraction"),
            max_solar_zenith_angle: row.get("custom_max_solar_zenith_angle"),
        },
    })
}
