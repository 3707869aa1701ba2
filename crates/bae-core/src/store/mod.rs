//! Durable state for jobs, sites, datasets, and granules (`spec.md` §4.1).
//!
//! Styled directly on `resume_db::ResumeDb`: a `sqlx::Pool<Sqlite>` wrapper
//! opened once, migrated forward-only on open, with one `impl Store` block
//! per entity family below. Unlike `ResumeDb`'s single `jobs` table, BAE
//! persists four related tables plus an ambient `exports` table (see
//! `SPEC_FULL.md` §3), so `createJob`/`createSitesBatch`/etc. are split
//! across `store::jobs`, `store::sites`, `store::datasets`, `store::granules`
//! the way the teacher splits `resume_db::jobs::{read, write}`.

mod codec;
mod datasets;
mod error;
mod granules;
mod jobs;
mod schema;
mod sites;

pub use error::RecoverableStoreError;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct Store {
    pub(crate) pool: Pool<Sqlite>,
    pub(crate) data_dir: PathBuf,
}

impl Store {
    /// Open (or create) `<data_dir>/bae.db` and run migrations.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("bae.db");
        let uri = format!("sqlite://{}", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;

        let store = Store {
            pool,
            data_dir: data_dir.to_path_buf(),
        };
        schema::migrate(&store.pool).await?;
        Ok(store)
    }

    /// Open an in-memory database, used by tests the way `resume_db`'s own
    /// test harness does.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Store {
            pool,
            data_dir: PathBuf::from("."),
        };
        schema::migrate(&store.pool).await?;
        Ok(store)
    }

    /// Directory holding this job's per-site subdirectories
    /// (`spec.md` §6 on-disk layout).
    pub fn job_dir(&self, job_id: crate::model::JobId) -> PathBuf {
        self.data_dir.join(format!("job-{job_id}"))
    }

    /// Directory holding one site's hourly files and combined artifact.
    pub fn site_dir(&self, job_id: crate::model::JobId, site_id: crate::model::SiteId) -> PathBuf {
        self.job_dir(job_id).join(format!("site-{site_id}"))
    }

    /// Cascades through sites, their datasets, their granules, their
    /// exports; also removes the job's on-disk directory tree
    /// (`spec.md` §4.1 `deleteJobFull`).
    pub async fn delete_job_full(&self, job_id: crate::model::JobId) -> Result<()> {
        let dataset_ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM datasets WHERE batch_job_id = ?1",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        // Foreign keys are suspended for the multi-table unwind the same way
        // `delete_batch_job_full` disables them on a raw connection.
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&self.pool)
            .await?;

        for dataset_id in &dataset_ids {
            sqlx::query("DELETE FROM granules WHERE dataset_id = ?1")
                .bind(dataset_id)
                .execute(&self.pool)
                .await?;
            sqlx::query("DELETE FROM exports WHERE dataset_id = ?1")
                .bind(dataset_id)
                .execute(&self.pool)
                .await?;
        }
        sqlx::query("DELETE FROM batch_sites WHERE batch_job_id = ?1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM datasets WHERE batch_job_id = ?1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM batch_jobs WHERE id = ?1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let job_dir = self.job_dir(job_id);
        if job_dir.exists() {
            tokio::fs::remove_dir_all(&job_dir).await?;
        }

        Ok(())
    }
}

pub(crate) fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
