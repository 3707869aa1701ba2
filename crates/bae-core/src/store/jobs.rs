use anyhow::Result;
use sqlx::Row;

use super::codec::{
    date_to_text, datetime_to_text, hours_from_json, hours_to_json, text_to_date,
    text_to_datetime, weekday_mask_from_json, weekday_mask_to_json,
};
use super::Store;
use crate::model::{AcquisitionFilters, BatchJob, BatchJobStatus, JobId};

impl Store {
    /// Assigns an id, persists, and returns the persisted row
    /// (`spec.md` §4.1 `createJob`).
    pub async fn create_job(&self, mut job: BatchJob) -> Result<BatchJob> {
        let id = sqlx::query(
            r#"
            INSERT INTO batch_jobs (
                name, created_at, status, source_file,
                total_sites, completed_sites, failed_sites,
                default_radius_km, date_start, date_end,
                weekday_mask, hour_list, max_cloud_fraction, max_solar_zenith_angle,
                batch_size, last_processed_at, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&job.name)
        .bind(datetime_to_text(job.created_at))
        .bind(job.status.as_str())
        .bind(&job.source_file)
        .bind(job.total_sites)
        .bind(job.completed_sites)
        .bind(job.failed_sites)
        .bind(job.default_radius_km)
        .bind(date_to_text(job.default_date_start))
        .bind(date_to_text(job.default_date_end))
        .bind(weekday_mask_to_json(&job.default_weekday_mask))
        .bind(hours_to_json(&job.default_hours))
        .bind(job.default_filters.max_cloud_fraction)
        .bind(job.default_filters.max_solar_zenith_angle)
        .bind(job.batch_size)
        .bind(job.last_processed_at.map(datetime_to_text))
        .bind(&job.error_message)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        job.id = id;
        Ok(job)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>> {
        let row = sqlx::query("SELECT * FROM batch_jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_job).transpose()
    }

    pub async fn list_jobs(&self) -> Result<Vec<BatchJob>> {
        let rows = sqlx::query("SELECT * FROM batch_jobs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_job).collect()
    }

    /// In-place row update (`spec.md` §4.1 `updateJob`).
    pub async fn update_job(&self, job: &BatchJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_jobs SET
                status = ?1, total_sites = ?2, completed_sites = ?3, failed_sites = ?4,
                batch_size = ?5, last_processed_at = ?6, error_message = ?7
            WHERE id = ?8
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.total_sites)
        .bind(job.completed_sites)
        .bind(job.failed_sites)
        .bind(job.batch_size)
        .bind(job.last_processed_at.map(datetime_to_text))
        .bind(&job.error_message)
        .bind(job.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Demotes every `RUNNING` job to `PAUSED` with a fixed message
    /// (`spec.md` §4.8 Recovery). Returns the demoted jobs' ids, not just a
    /// count, so the caller can reset sites for exactly these jobs and leave
    /// jobs a user had already paused before the crash untouched.
    pub async fn recover_running_jobs(&self) -> Result<Vec<JobId>> {
        let rows = sqlx::query(
            r#"
            UPDATE batch_jobs SET
                status = 'paused',
                error_message = 'Interrupted by app restart'
            WHERE status = 'running'
            RETURNING id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}

fn row_to_job(row: sqlx::sqlite::SqliteRow) -> Result<BatchJob> {
    let weekday_mask_json: String = row.get("weekday_mask");
    let hour_list_json: String = row.get("hour_list");
    let last_processed_at: Option<String> = row.get("last_processed_at");

    Ok(BatchJob {
        id: row.get("id"),
        name: row.get("name"),
        created_at: text_to_datetime(&row.get::<String, _>("created_at"))?,
        status: BatchJobStatus::from_str(&row.get::<String, _>("status")),
        source_file: row.get("source_file"),
        total_sites: row.get("total_sites"),
        completed_sites: row.get("completed_sites"),
        failed_sites: row.get("failed_sites"),
        default_radius_km: row.get("default_radius_km"),
        default_date_start: text_to_date(&row.get::<String, _>("date_start"))?,
        default_date_end: text_to_date(&row.get::<String, _>("date_end"))?,
        default_weekday_mask: weekday_mask_from_json(&weekday_mask_json)?,
        default_hours: hours_from_json(&hour_list_json)?,
        default_filters: AcquisitionFilters {
            max_cloud_fraction: row.get("max_cloud_fraction"),
            max_solar_zenith_angle: row.get("max_solar_zenith_angle"),
        },
        batch_size: row.get("batch_size"),
        last_processed_at: last_processed_at.map(|s| text_to_datetime(&s)).transpose()?,
        error_message: row.get("error_message"),
    })
}
