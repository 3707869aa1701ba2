use anyhow::Result;
use sqlx::Row;

use super::codec::{date_to_text, datetime_to_text, text_to_date, text_to_datetime};
use super::Store;
use crate::geo::BoundingBox;
use crate::model::{DatasetId, Granule};

impl Store {
    /// Persists planned granule rows, skipping any that already exist for
    /// the same `(dataset_id, date, hour)` (`spec.md` §4.7 step e: "persist
    /// the resulting Granule rows, ignoring duplicates").
    pub async fn create_granules_batch(&self, granules: &[Granule]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for granule in granules {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO granules (
                    dataset_id, date, hour, bbox_west, bbox_south, bbox_east, bbox_north,
                    max_cloud_fraction, max_solar_zenith_angle,
                    downloaded, downloaded_at, content_hash,
                    no2_valid_pixels, no2_mean, hcho_valid_pixels, hcho_mean,
                    o3_valid_pixels, o3_mean, file_path, file_size_bytes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                "#,
            )
            .bind(granule.dataset_id)
            .bind(date_to_text(granule.date))
            .bind(granule.hour)
            .bind(granule.bbox.west)
            .bind(granule.bbox.south)
            .bind(granule.bbox.east)
            .bind(granule.bbox.north)
            .bind(granule.max_cloud_fraction)
            .bind(granule.max_solar_zenith_angle)
            .bind(granule.downloaded)
            .bind(granule.downloaded_at.map(datetime_to_text))
            .bind(&granule.content_hash)
            .bind(granule.no2_valid_pixels)
            .bind(granule.no2_mean)
            .bind(granule.hcho_valid_pixels)
            .bind(granule.hcho_mean)
            .bind(granule.o3_valid_pixels)
            .bind(granule.o3_mean)
            .bind(&granule.file_path)
            .bind(granule.file_size_bytes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_granules_for_dataset(&self, dataset_id: DatasetId) -> Result<Vec<Granule>> {
        let rows = sqlx::query("SELECT * FROM granules WHERE dataset_id = ?1 ORDER BY date, hour")
            .bind(dataset_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_granule).collect()
    }

    /// First downloaded granule sharing `content_hash`, across any dataset
    /// (`spec.md` §4.1 `findGranuleByHash`).
    pub async fn find_granule_by_hash(&self, content_hash: &str) -> Result<Option<Granule>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM granules
            WHERE content_hash = ?1 AND downloaded = 1
            ORDER BY downloaded_at ASC
            LIMIT 1
            "#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_granule).transpose()
    }

    pub async fn update_granule(&self, granule: &Granule) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE granules SET
                downloaded = ?1, downloaded_at = ?2, content_hash = ?3,
                no2_valid_pixels = ?4, no2_mean = ?5, hcho_valid_pixels = ?6, hcho_mean = ?7,
                o3_valid_pixels = ?8, o3_mean = ?9, file_path = ?10, file_size_bytes = ?11
            WHERE id = ?12
            "#,
        )
        .bind(granule.downloaded)
        .bind(granule.downloaded_at.map(datetime_to_text))
        .bind(&granule.content_hash)
        .bind(granule.no2_valid_pixels)
        .bind(granule.no2_mean)
        .bind(granule.hcho_valid_pixels)
        .bind(granule.hcho_mean)
        .bind(granule.o3_valid_pixels)
        .bind(granule.o3_mean)
        .bind(&granule.file_path)
        .bind(granule.file_size_bytes)
        .bind(granule.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_granule(row: sqlx::sqlite::SqliteRow) -> Result<Granule> {
    let downloaded_at: Option<String> = row.get("downloaded_at");

    Ok(Granule {
        id: row.get("id"),
        dataset_id: row.get("dataset_id"),
        date: text_to_date(&row.get::<String, _>("date"))?,
        hour: row.get::<i64, _>("hour") as u32,
        bbox: BoundingBox {
            west: row.get("bbox_west"),
            south: row.get("bbox_south"),
            east: row.get("bbox_east"),
            north: row.get("bbox_north"),
        },
        max_cloud_fraction: row.get("max_cloud_fraction"),
        max_solar_zenith_angle: row.get("max_solar_zenith_angle"),
        downloaded: row.get("downloaded"),
        downloaded_at: downloaded_at.map(|s| text_to_datetime(&s)).transpose()?,
        content_hash: row.get("content_hash"),
        no2_valid_pixels: row.get("no2_valid_pixels"),
        no2_mean: row.get("no2_mean"),
        hcho_valid_pixels: row.get("hcho_valid_pixels"),
        hcho_mean: row.get("hcho_mean"),
        o3_valid_pixels: row.get("o3_valid_pixels"),
        o3_mean: row.get("o3_mean"),
        file_path: row.get("file_path"),
        file_size_bytes: row.get("file_size_bytes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AcquisitionFilters, BatchJob, BatchJobStatus, Dataset, DatasetStatus};
    use crate::store::Store;
    use chrono::NaiveDate;

    async fn dataset_fixture(store: &Store) -> DatasetId {
        let job = BatchJob {
            id: 0,
            name: "job".into(),
            created_at: super::super::now(),
            status: BatchJobStatus::Pending,
            source_file: None,
            total_sites: 1,
            completed_sites: 0,
            failed_sites: 0,
            default_radius_km: 10.0,
            default_date_start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_date_end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_weekday_mask: vec![5, 6],
            default_hours: vec![16, 17],
            default_filters: AcquisitionFilters {
                max_cloud_fraction: 0.5,
                max_solar_zenith_angle: 70.0,
            },
            batch_size: 2,
            last_processed_at: None,
            error_message: None,
        };
        let job = store.create_job(job).await.unwrap();

        let dataset = Dataset {
            id: 0,
            name: "site-1".into(),
            job_id: Some(job.id),
            created_at: super::super::now(),
            bbox: BoundingBox {
                west: -111.1,
                south: 39.9,
                east: -110.9,
                north: 40.1,
            },
            date_start: job.default_date_start,
            date_end: job.default_date_end,
            weekday_mask: job.default_weekday_mask.clone(),
            hours: job.default_hours.clone(),
            filters: job.default_filters,
            status: DatasetStatus::Pending,
            file_path: None,
            file_size_bytes: None,
            file_hash: None,
            last_accessed_at: None,
            planned_granule_count: 2,
            downloaded_granule_count: 0,
            selected_variables: None,
        };
        store.create_dataset(dataset).await.unwrap().id
    }

    fn granule_fixture(dataset_id: DatasetId, hour: u32, content_hash: &str) -> Granule {
        Granule {
            id: 0,
            dataset_id,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            hour,
            bbox: BoundingBox {
                west: -111.1,
                south: 39.9,
                east: -110.9,
                north: 40.1,
            },
            max_cloud_fraction: 0.5,
            max_solar_zenith_angle: 70.0,
            downloaded: false,
            downloaded_at: None,
            content_hash: content_hash.into(),
            no2_valid_pixels: None,
            no2_mean: None,
            hcho_valid_pixels: None,
            hcho_mean: None,
            o3_valid_pixels: None,
            o3_mean: None,
            file_path: None,
            file_size_bytes: None,
        }
    }

    #[tokio::test]
    async fn create_granules_batch_ignores_duplicate_date_hour() {
        let store = Store::open_in_memory().await.unwrap();
        let dataset_id = dataset_fixture(&store).await;
        let g = granule_fixture(dataset_id, 16, "hash-a");
        store.create_granules_batch(&[g.clone()]).await.unwrap();
        store.create_granules_batch(&[g]).await.unwrap();

        let granules = store.get_granules_for_dataset(dataset_id).await.unwrap();
        assert_eq!(granules.len(), 1);
    }

    #[tokio::test]
    async fn find_granule_by_hash_returns_first_downloaded_match() {
        let store = Store::open_in_memory().await.unwrap();
        let dataset_id = dataset_fixture(&store).await;
        let mut g = granule_fixture(dataset_id, 16, "shared-hash");
        store.create_granules_batch(&[g.clone()]).await.unwrap();

        assert!(store
            .find_granule_by_hash("shared-hash")
            .await
            .unwrap()
            .is_none());

        let mut granules = store.get_granules_for_dataset(dataset_id).await.unwrap();
        g = granules.remove(0);
        g.downloaded = true;
        g.downloaded_at = Some(super::super::now());
        g.file_path = Some("/tmp/tempo_2024-06-01_16.nc".into());
        store.update_granule(&g).await.unwrap();

        let found = store.find_granule_by_hash("shared-hash").await.unwrap().unwrap();
        assert_eq!(found.id, g.id);
        assert!(found.downloaded);
    }
}
