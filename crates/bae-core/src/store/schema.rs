//! Forward-only schema: `CREATE TABLE IF NOT EXISTS` plus `PRAGMA table_info`
//! + `ALTER TABLE ADD COLUMN` for anything added after a database already
//! exists, exactly the pattern in `database.py::_run_migrations` and the
//! teacher's own `ResumeDb::migrate`.

use anyhow::Result;
use sqlx::{Pool, Row, Sqlite};

pub(super) async fn migrate(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            source_file TEXT,
            total_sites INTEGER NOT NULL DEFAULT 0,
            completed_sites INTEGER NOT NULL DEFAULT 0,
            failed_sites INTEGER NOT NULL DEFAULT 0,
            default_radius_km REAL NOT NULL DEFAULT 10.0,
            date_start TEXT NOT NULL,
            date_end TEXT NOT NULL,
            weekday_mask TEXT NOT NULL,
            hour_list TEXT NOT NULL,
            max_cloud_fraction REAL NOT NULL DEFAULT 0.3,
            max_solar_zenith_angle REAL NOT NULL DEFAULT 70.0,
            batch_size INTEGER NOT NULL DEFAULT 5,
            last_processed_at TEXT,
            error_message TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            batch_job_id INTEGER REFERENCES batch_jobs(id),
            created_at TEXT NOT NULL,
            bbox_west REAL NOT NULL,
            bbox_south REAL NOT NULL,
            bbox_east REAL NOT NULL,
            bbox_north REAL NOT NULL,
            date_start TEXT NOT NULL,
            date_end TEXT NOT NULL,
            weekday_mask TEXT NOT NULL,
            hour_list TEXT NOT NULL,
            max_cloud_fraction REAL NOT NULL,
            max_solar_zenith_angle REAL NOT NULL,
            selected_variables TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            file_path TEXT,
            file_hash TEXT,
            file_size_bytes INTEGER,
            last_accessed_at TEXT,
            planned_granule_count INTEGER NOT NULL DEFAULT 0,
            downloaded_granule_count INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS granules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            hour INTEGER NOT NULL,
            bbox_west REAL NOT NULL,
            bbox_south REAL NOT NULL,
            bbox_east REAL NOT NULL,
            bbox_north REAL NOT NULL,
            max_cloud_fraction REAL NOT NULL,
            max_solar_zenith_angle REAL NOT NULL,
            downloaded INTEGER NOT NULL DEFAULT 0,
            downloaded_at TEXT,
            content_hash TEXT NOT NULL,
            no2_valid_pixels INTEGER,
            no2_mean REAL,
            hcho_valid_pixels INTEGER,
            hcho_mean REAL,
            o3_valid_pixels INTEGER,
            o3_mean REAL,
            file_path TEXT,
            file_size_bytes INTEGER,
            UNIQUE(dataset_id, date, hour)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
            format TEXT NOT NULL,
            file_path TEXT NOT NULL,
            created_at TEXT NOT NULL,
            file_size_bytes INTEGER
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_job_id INTEGER NOT NULL REFERENCES batch_jobs(id) ON DELETE CASCADE,
            site_name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            radius_km REAL NOT NULL DEFAULT 10.0,
            bbox_west REAL NOT NULL,
            bbox_south REAL NOT NULL,
            bbox_east REAL NOT NULL,
            bbox_north REAL NOT NULL,
            custom_date_start TEXT,
            custom_date_end TEXT,
            custom_hour_start INTEGER,
            custom_hour_end INTEGER,
            custom_max_cloud_fraction REAL,
            custom_max_solar_zenith_angle REAL,
            status TEXT NOT NULL DEFAULT 'pending',
            dataset_id INTEGER REFERENCES datasets(id),
            error_message TEXT,
            started_at TEXT,
            finished_at TEXT,
            sequence_number INTEGER NOT NULL,
            UNIQUE(batch_job_id, sequence_number)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_granules_dataset ON granules(dataset_id);")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_granules_hash ON granules(content_hash);")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_exports_dataset ON exports(dataset_id);")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_batch_sites_job ON batch_sites(batch_job_id);")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_batch_sites_status ON batch_sites(status);")
        .execute(pool)
        .await?;

    run_forward_only_migrations(pool).await?;

    Ok(())
}

/// Columns added after the tables above were first shipped. New databases
/// already have them from `CREATE TABLE`; existing databases get them added
/// here. No column is ever dropped or renamed.
async fn run_forward_only_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    let dataset_columns = table_columns(pool, "datasets").await?;
    if !dataset_columns.iter().any(|c| c == "file_hash") {
        sqlx::query("ALTER TABLE datasets ADD COLUMN file_hash TEXT")
            .execute(pool)
            .await?;
    }
    if !dataset_columns.iter().any(|c| c == "selected_variables") {
        sqlx::query("ALTER TABLE datasets ADD COLUMN selected_variables TEXT")
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn table_columns(pool: &Pool<Sqlite>, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
}
