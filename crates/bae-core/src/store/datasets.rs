use anyhow::Result;
use sqlx::Row;

use super::codec::{
    date_to_text, datetime_to_text, hours_from_json, hours_to_json, text_to_date,
    text_to_datetime, weekday_mask_from_json, weekday_mask_to_json,
};
use super::Store;
use crate::geo::BoundingBox;
use crate::model::{AcquisitionFilters, Dataset, DatasetId, DatasetStatus, JobId};

impl Store {
    pub async fn create_dataset(&self, mut dataset: Dataset) -> Result<Dataset> {
        let selected_variables_json = dataset
            .selected_variables
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()?;

        let id = sqlx::query(
            r#"
            INSERT INTO datasets (
                name, batch_job_id, created_at, bbox_west, bbox_south, bbox_east, bbox_north,
                date_start, date_end, weekday_mask, hour_list,
                max_cloud_fraction, max_solar_zenith_angle, selected_variables,
                status, file_path, file_hash, file_size_bytes, last_accessed_at,
                planned_granule_count, downloaded_granule_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
            "#,
        )
        .bind(&dataset.name)
        .bind(dataset.job_id)
        .bind(datetime_to_text(dataset.created_at))
        .bind(dataset.bbox.west)
        .bind(dataset.bbox.south)
        .bind(dataset.bbox.east)
        .bind(dataset.bbox.north)
        .bind(date_to_text(dataset.date_start))
        .bind(date_to_text(dataset.date_end))
        .bind(weekday_mask_to_json(&dataset.weekday_mask))
        .bind(hours_to_json(&dataset.hours))
        .bind(dataset.filters.max_cloud_fraction)
        .bind(dataset.filters.max_solar_zenith_angle)
        .bind(selected_variables_json)
        .bind(dataset.status.as_str())
        .bind(&dataset.file_path)
        .bind(&dataset.file_hash)
        .bind(dataset.file_size_bytes)
        .bind(dataset.last_accessed_at.map(datetime_to_text))
        .bind(dataset.planned_granule_count)
        .bind(dataset.downloaded_granule_count)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        dataset.id = id;
        Ok(dataset)
    }

    pub async fn get_dataset(&self, id: DatasetId) -> Result<Option<Dataset>> {
        let row = sqlx::query("SELECT * FROM datasets WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_dataset).transpose()
    }

    pub async fn get_datasets_for_job(&self, job_id: JobId) -> Result<Vec<Dataset>> {
        let rows = sqlx::query("SELECT * FROM datasets WHERE batch_job_id = ?1 ORDER BY created_at")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_dataset).collect()
    }

    pub async fn update_dataset(&self, dataset: &Dataset) -> Result<()> {
        let selected_variables_json = dataset
            .selected_variables
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE datasets SET
                name = ?1, status = ?2, file_path = ?3, file_hash = ?4, file_size_bytes = ?5,
                last_accessed_at = ?6, planned_granule_count = ?7, downloaded_granule_count = ?8,
                selected_variables = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&dataset.name)
        .bind(dataset.status.as_str())
        .bind(&dataset.file_path)
        .bind(&dataset.file_hash)
        .bind(dataset.file_size_bytes)
        .bind(dataset.last_accessed_at.map(datetime_to_text))
        .bind(dataset.planned_granule_count)
        .bind(dataset.downloaded_granule_count)
        .bind(selected_variables_json)
        .bind(dataset.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_dataset(row: sqlx::sqlite::SqliteRow) -> Result<Dataset> {
    let weekday_mask_json: String = row.get("weekday_mask");
    let hour_list_json: String = row.get("hour_list");
    let selected_variables_json: Option<String> = row.get("selected_variables");
    let last_accessed_at: Option<String> = row.get("last_accessed_at");

    Ok(Dataset {
        id: row.get("id"),
        name: row.get("name"),
        job_id: row.get("batch_job_id"),
        created_at: text_to_datetime(&row.get::<String, _>("created_at"))?,
        bbox: BoundingBox {
            west: row.get("bbox_west"),
            south: row.get("bbox_south"),
            east: row.get("bbox_east"),
            north: row.get("bbox_north"),
        },
        date_start: text_to_date(&row.get::<String, _>("date_start"))?,
        date_end: text_to_date(&row.get::<String, _>("date_end"))?,
        weekday_mask: weekday_mask_from_json(&weekday_mask_json)?,
        hours: hours_from_json(&hour_list_json)?,
        filters: AcquisitionFilters {
            max_cloud_fraction: row.get("max_cloud_fraction"),
            max_solar_zenith_angle: row.get("max_solar_zenith_angle"),
        },
        status: DatasetStatus::from_str(&row.get::<String, _>("status")),
        file_path: row.get("file_path"),
        file_size_bytes: row.get("file_size_bytes"),
        file_hash: row.get("file_hash"),
        last_accessed_at: last_accessed_at.map(|s| text_to_datetime(&s)).transpose()?,
        planned_granule_count: row.get("planned_granule_count"),
        downloaded_granule_count: row.get("downloaded_granule_count"),
        selected_variables: selected_variables_json
            .map(|s| serde_json::from_str(&s))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::NaiveDate;

    fn sample_dataset() -> Dataset {
        Dataset {
            id: 0,
            name: "site-1".into(),
            job_id: None,
            created_at: super::super::now(),
            bbox: BoundingBox {
                west: -111.1,
                south: 39.9,
                east: -110.9,
                north: 40.1,
            },
            date_start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            weekday_mask: vec![5, 6],
            hours: vec![16, 17],
            filters: AcquisitionFilters {
                max_cloud_fraction: 0.5,
                max_solar_zenith_angle: 70.0,
            },
            status: DatasetStatus::Pending,
            file_path: None,
            file_size_bytes: None,
            file_hash: None,
            last_accessed_at: None,
            planned_granule_count: 4,
            downloaded_granule_count: 0,
            selected_variables: Some(vec!["NO2_TropVCD".into(), "HCHO_TotVCD".into()]),
        }
    }

    #[tokio::test]
    async fn create_then_update_dataset_roundtrips() {
        let store = Store::open_in_memory().await.unwrap();
        let mut dataset = store.create_dataset(sample_dataset()).await.unwrap();
        assert!(dataset.id > 0);

        dataset.status = DatasetStatus::Complete;
        dataset.file_path = Some("/tmp/site-1_processed.nc".into());
        dataset.downloaded_granule_count = 4;
        store.update_dataset(&dataset).await.unwrap();

        let fetched = store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DatasetStatus::Complete);
        assert_eq!(fetched.downloaded_granule_count, 4);
        assert_eq!(
            fetched.selected_variables,
            Some(vec!["NO2_TropVCD".to_string(), "HCHO_TotVCD".to_string()])
        );
    }
}
