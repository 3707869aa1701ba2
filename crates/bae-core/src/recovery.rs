//! Recovery: sweeps the Store once at process start so a prior crash or
//! unclean shutdown can be resumed safely (`spec.md` §4.8).
//!
//! Generalizes `resume_db::jobs::write::recover_running_jobs`'s single-table
//! sweep to the two-table sweep `original_source/.../core/batch_scheduler.py
//! ::recover_interrupted_jobs` performs: demote every `RUNNING` job to
//! `PAUSED`, then reset that job's in-flight sites back to `PENDING`.

use anyhow::Result;

use crate::store::Store;

/// Runs exactly once at process start, before any `scheduler::run_job` call
/// (`spec.md` §4.8). Returns the number of jobs recovered. Only sweeps sites
/// for jobs this call itself just demoted from `RUNNING` — a job a user had
/// already paused before the crash is left untouched (`spec.md` §4.8 "Does
/// not touch jobs in any other state").
pub async fn recover(store: &Store) -> Result<u64> {
    let recovered_ids = store.recover_running_jobs().await?;
    for job_id in &recovered_ids {
        store.reset_interrupted_sites(*job_id).await?;
    }

    Ok(recovered_ids.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use crate::model::{
        AcquisitionFilters, BatchJob, BatchJobStatus, BatchSite, BatchSiteStatus, SiteOverrides,
    };
    use chrono::NaiveDate;

    fn job_fixture() -> BatchJob {
        BatchJob {
            id: 0,
            name: "job".into(),
            created_at: chrono::Utc::now().naive_utc(),
            status: BatchJobStatus::Running,
            source_file: None,
            total_sites: 1,
            completed_sites: 0,
            failed_sites: 0,
            default_radius_km: 10.0,
            default_date_start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_date_end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_weekday_mask: vec![5, 6],
            default_hours: vec![16],
            default_filters: AcquisitionFilters {
                max_cloud_fraction: 0.5,
                max_solar_zenith_angle: 70.0,
            },
            batch_size: 2,
            last_processed_at: None,
            error_message: None,
        }
    }

    fn site_fixture(job_id: i64) -> BatchSite {
        BatchSite {
            id: 0,
            job_id,
            name: "site-1".into(),
            lat: 40.0,
            lon: -111.0,
            radius_km: 10.0,
            bbox: BoundingBox {
                west: -111.1,
                south: 39.9,
                east: -110.9,
                north: 40.1,
            },
            status: BatchSiteStatus::Downloading,
            dataset_id: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            sequence_number: 1,
            overrides: SiteOverrides::default(),
        }
    }

    #[tokio::test]
    async fn recover_demotes_running_jobs_and_resets_their_sites() {
        let store = Store::open_in_memory().await.unwrap();
        let job = store.create_job(job_fixture()).await.unwrap();
        store.create_sites_batch(&[site_fixture(job.id)]).await.unwrap();

        let n = recover(&store).await.unwrap();
        assert_eq!(n, 1);

        let job = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, BatchJobStatus::Paused);

        let sites = store.get_sites(job.id).await.unwrap();
        assert_eq!(sites[0].status, BatchSiteStatus::Pending);
    }

    #[tokio::test]
    async fn recover_is_noop_when_nothing_was_running() {
        let store = Store::open_in_memory().await.unwrap();
        let n = recover(&store).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn recover_leaves_already_paused_jobs_and_their_sites_untouched() {
        let store = Store::open_in_memory().await.unwrap();

        let mut already_paused = job_fixture();
        already_paused.status = BatchJobStatus::Paused;
        let already_paused = store.create_job(already_paused).await.unwrap();
        let mut paused_site = site_fixture(already_paused.id);
        paused_site.status = BatchSiteStatus::Downloading;
        store.create_sites_batch(&[paused_site]).await.unwrap();

        let running = store.create_job(job_fixture()).await.unwrap();
        store.create_sites_batch(&[site_fixture(running.id)]).await.unwrap();

        let n = recover(&store).await.unwrap();
        assert_eq!(n, 1);

        let still_paused = store.get_job(already_paused.id).await.unwrap().unwrap();
        assert_eq!(still_paused.status, BatchJobStatus::Paused);
        let untouched_sites = store.get_sites(already_paused.id).await.unwrap();
        assert_eq!(untouched_sites[0].status, BatchSiteStatus::Downloading);

        let demoted = store.get_job(running.id).await.unwrap().unwrap();
        assert_eq!(demoted.status, BatchJobStatus::Paused);
        let reset_sites = store.get_sites(running.id).await.unwrap();
        assert_eq!(reset_sites[0].status, BatchSiteStatus::Pending);
    }
}
