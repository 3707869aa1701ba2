//! Batch Scheduler: drives one `BatchJob` to a terminal state, running its
//! pending sites through a bounded-parallel pool (`spec.md` §4.7).
//!
//! Pool shape copied from `scheduler::parallel::run_jobs_parallel`'s
//! `JoinSet` refill loop, one level up from `site_downloader`'s per-granule
//! pool: here the pooled units are sites within one job rather than granule
//! fetches within one site.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::combiner::{self, JsonGranuleCodec};
use crate::config::BaeConfig;
use crate::control::{JobControl, JobTokens};
use crate::fetch::naive::NaiveJsonPayload;
use crate::model::{
    BatchJob, BatchJobStatus, BatchSite, BatchSiteStatus, Dataset, DatasetStatus, Granule,
};
use crate::planner;
use crate::remote;
use crate::sanitize::sanitize_filename;
use crate::site_downloader::{self, GranuleOutcome};
use crate::store::Store;

/// Variable names the derived RATIO field divides, carried over verbatim
/// from `processor.py`'s FNR formula (`HCHO_TotVCD / NO2_TropVCD`).
const RATIO_NUMERATOR_VAR: &str = "HCHO_TotVCD";
const RATIO_DENOMINATOR_VAR: &str = "NO2_TropVCD";

/// One progress-stream entry (`spec.md` §6's `(event, message, progress)`
/// callback contract, generalized to carry the job/site it concerns so a UI
/// can route `onProgress`/`onSiteComplete`/`onJobComplete` (`spec.md` §4.9)
/// from a single stream).
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub job_id: i64,
    pub site_id: Option<i64>,
    pub message: String,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Info,
    Download,
    Ok,
    Warning,
    Error,
}

/// Emits `event` through `on_progress` and mirrors it to `tracing` at a
/// matching level, so a log file always has an independent record of
/// everything the UI was told (`SPEC_FULL.md` §7).
fn emit(on_progress: &(dyn Fn(ProgressEvent) + Send + Sync), event: ProgressEvent) {
    match event.kind {
        ProgressKind::Info | ProgressKind::Download | ProgressKind::Ok => {
            tracing::info!(job_id = event.job_id, site_id = ?event.site_id, "{}", event.message)
        }
        ProgressKind::Warning => {
            tracing::warn!(job_id = event.job_id, site_id = ?event.site_id, "{}", event.message)
        }
        ProgressKind::Error => {
            tracing::error!(job_id = event.job_id, site_id = ?event.site_id, "{}", event.message)
        }
    }
    on_progress(event);
}

/// Drives `job_id` to a terminal state (`spec.md` §4.7). May be re-entered
/// after a pause or crash, as long as the job is not currently `RUNNING`.
pub async fn run_job(
    store: &Store,
    control: &JobControl,
    config: &BaeConfig,
    job_id: i64,
    on_progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
) -> Result<BatchJobStatus> {
    let on_progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(on_progress);

    let job = store
        .get_job(job_id)
        .await?
        .with_context(|| format!("job {job_id} not found"))?;
    if job.status == BatchJobStatus::Running {
        anyhow::bail!("job {job_id} is already running");
    }
    if job.status == BatchJobStatus::Completed {
        // Idempotent on a completed job: no writes, no side effects
        // (`spec.md` §8).
        return Ok(job.status);
    }

    let mut job = job;
    job.status = BatchJobStatus::Running;
    store.update_job(&job).await?;

    store.reset_interrupted_sites(job_id).await?;

    let pending = store.get_pending_sites(job_id).await?;
    emit(
        &*on_progress,
        ProgressEvent {
            kind: ProgressKind::Info,
            job_id,
            site_id: None,
            message: format!("{} site(s) pending", pending.len()),
            progress: None,
        },
    );

    if pending.is_empty() {
        let mut job = store.get_job(job_id).await?.context("job vanished mid-run")?;
        if job.completed_sites + job.failed_sites >= job.total_sites {
            job.status = BatchJobStatus::Completed;
        }
        store.update_job(&job).await?;
        return Ok(job.status);
    }

    let tokens = control.register(job_id);
    // `job.batch_size` (falling back to the configured default when absent,
    // `spec.md` §4.7 step 6).
    let batch_size = if job.batch_size > 0 {
        job.batch_size as usize
    } else {
        config.default_batch_size
    }
    .max(1);

    let mut remaining = pending.into_iter();
    let mut join_set = tokio::task::JoinSet::new();

    loop {
        while join_set.len() < batch_size {
            let Some(site) = remaining.next() else { break };
            if tokens.should_stop() {
                break;
            }
            let store = store.clone();
            let tokens = tokens.clone();
            let config = config.clone();
            let on_progress = Arc::clone(&on_progress);
            join_set.spawn(async move { process_site(&store, &tokens, &config, site, on_progress).await });
        }

        if join_set.is_empty() {
            break;
        }
        let Some(joined) = join_set.join_next().await else {
            break;
        };
        if let Err(e) = joined.map_err(|e| anyhow::anyhow!("site task join: {e}"))? {
            emit(
                &*on_progress,
                ProgressEvent {
                    kind: ProgressKind::Error,
                    job_id,
                    site_id: None,
                    message: format!("site worker failed: {e}"),
                    progress: None,
                },
            );
        }
    }

    control.unregister(job_id);

    let mut job = store.get_job(job_id).await?.context("job vanished mid-run")?;
    job.status = if tokens.is_cancelled() {
        job.error_message = Some("Cancelled by user".into());
        BatchJobStatus::Error
    } else if tokens.is_paused() {
        BatchJobStatus::Paused
    } else if job.completed_sites + job.failed_sites >= job.total_sites {
        BatchJobStatus::Completed
    } else {
        BatchJobStatus::Paused
    };
    job.last_processed_at = Some(Utc::now().naive_utc());
    store.update_job(&job).await?;

    emit(
        &*on_progress,
        ProgressEvent {
            kind: ProgressKind::Ok,
            job_id,
            site_id: None,
            message: format!("job {job_id} reached terminal status {:?}", job.status),
            progress: Some(1.0),
        },
    );

    Ok(job.status)
}

/// One site's full pipeline (`spec.md` §4.7 step 7): plan, download,
/// combine, and update Store/job counters. Errors from this function are a
/// per-site worker failure (already logged by the caller); per-site
/// acquisition failures are instead recorded on the site/dataset rows and
/// returned as `Ok(())`, matching the "fatal per-site" taxonomy entry in
/// `spec.md` §7 (other sites must keep running).
async fn process_site(
    store: &Store,
    tokens: &JobTokens,
    config: &BaeConfig,
    mut site: BatchSite,
    on_progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
) -> Result<()> {
    let job_id = site.job_id;

    if tokens.should_stop() {
        return Ok(());
    }

    site.status = BatchSiteStatus::Downloading;
    site.started_at = Some(Utc::now().naive_utc());
    store.update_site(&site).await?;

    let job = store.get_job(job_id).await?.context("owning job vanished")?;
    let (date_start, date_end, hours, filters) = site.overrides.resolve(
        job.default_date_start,
        job.default_date_end,
        &job.default_hours,
        job.default_filters,
    );
    let weekday_mask = job.default_weekday_mask.clone();

    let dataset = Dataset {
        id: 0,
        name: site.name.clone(),
        job_id: Some(job_id),
        created_at: Utc::now().naive_utc(),
        bbox: site.bbox,
        date_start,
        date_end,
        weekday_mask: weekday_mask.clone(),
        hours: hours.clone(),
        filters,
        status: DatasetStatus::Downloading,
        file_path: None,
        file_size_bytes: None,
        file_hash: None,
        last_accessed_at: None,
        planned_granule_count: 0,
        downloaded_granule_count: 0,
        selected_variables: None,
    };
    let mut dataset = store.create_dataset(dataset).await?;

    site.dataset_id = Some(dataset.id);
    store.update_site(&site).await?;

    let site_dir = store.site_dir(job_id, site.id);
    tokio::fs::create_dir_all(&site_dir).await?;

    let planned = planner::plan_granules(date_start, date_end, &weekday_mask, &hours);
    if planned.is_empty() {
        emit(
            &*on_progress,
            ProgressEvent {
                kind: ProgressKind::Warning,
                job_id,
                site_id: Some(site.id),
                message: "no dates match weekday mask; no files to download".into(),
                progress: None,
            },
        );
        finish_site_as_error(store, &mut site, &mut dataset, "No files downloaded").await?;
        bump_job_counter(store, job_id, false).await?;
        return Ok(());
    }

    dataset.planned_granule_count = planned.len() as i64;
    let granule_rows = planner::granules_for_dataset(dataset.id, &planned, site.bbox, filters);
    store.create_granules_batch(&granule_rows).await?;
    store.update_dataset(&dataset).await?;

    let base_url = config.remote_base_url.clone();
    let api_key = config.api_key.clone();
    let bbox = site.bbox;
    let request_url = move |g: &planner::PlannedGranule| {
        remote::granule_request_url(&base_url, &bbox, g.date, g.hour, filters, &api_key)
    };

    let results = site_downloader::download_site_granules::<NaiveJsonPayload>(
        &site_dir,
        planned,
        request_url,
        Default::default(),
        Duration::from_secs(config.request_timeout_secs),
        config.default_site_workers,
        tokens.clone(),
    )
    .await?;

    if tokens.is_cancelled() || tokens.is_paused() {
        // Leave the site in DOWNLOADING; Recovery resets it on next start
        // (`spec.md` §4.7 step f).
        return Ok(());
    }

    site.status = BatchSiteStatus::Processing;
    store.update_site(&site).await?;

    // Index the just-persisted rows by (date, hour) so each `GranuleResult`
    // (keyed only by the planned date/hour, not a row id) can be matched back
    // to the `Granule` row `create_granules_batch` assigned an id to.
    let mut granule_index: HashMap<(chrono::NaiveDate, u32), Granule> = store
        .get_granules_for_dataset(dataset.id)
        .await?
        .into_iter()
        .map(|g| ((g.date, g.hour), g))
        .collect();

    let mut saved_files = Vec::new();
    let mut downloaded_count = 0i64;
    for result in &results {
        match &result.outcome {
            GranuleOutcome::Saved { path, size_bytes } => {
                saved_files.push(path.clone());
                downloaded_count += 1;
                if let Some(g) = granule_index.get_mut(&(result.granule.date, result.granule.hour)) {
                    g.downloaded = true;
                    g.downloaded_at = Some(Utc::now().naive_utc());
                    g.file_path = Some(path.display().to_string());
                    g.file_size_bytes = Some(*size_bytes as i64);
                    store.update_granule(g).await?;
                }
            }
            GranuleOutcome::NoData => {}
            GranuleOutcome::Failed(msg) => {
                emit(
                    &*on_progress,
                    ProgressEvent {
                        kind: ProgressKind::Warning,
                        job_id,
                        site_id: Some(site.id),
                        message: format!(
                            "granule {} {:02} failed: {msg}",
                            result.granule.date, result.granule.hour
                        ),
                        progress: None,
                    },
                );
            }
        }
    }
    dataset.downloaded_granule_count = downloaded_count;
    store.update_dataset(&dataset).await?;

    if saved_files.is_empty() {
        finish_site_as_error(store, &mut site, &mut dataset, "No files downloaded").await?;
        bump_job_counter(store, job_id, false).await?;
        return Ok(());
    }

    let output_path: PathBuf = site_dir.join(format!("{}_processed.nc", sanitize_filename(&site.name)));
    let combine_result = combiner::process_site_files::<JsonGranuleCodec>(
        &saved_files,
        &output_path,
        RATIO_NUMERATOR_VAR,
        RATIO_DENOMINATOR_VAR,
    );

    match combine_result {
        Ok(_combined) => {
            let size = tokio::fs::metadata(&output_path).await?.len();
            dataset.status = DatasetStatus::Complete;
            dataset.file_path = Some(output_path.display().to_string());
            dataset.file_size_bytes = Some(size as i64);
            dataset.file_hash = Some(crate::checksum::sha256_path(&output_path)?);
            store.update_dataset(&dataset).await?;

            site.status = BatchSiteStatus::Completed;
            site.finished_at = Some(Utc::now().naive_utc());
            store.update_site(&site).await?;

            emit(
                &*on_progress,
                ProgressEvent {
                    kind: ProgressKind::Ok,
                    job_id,
                    site_id: Some(site.id),
                    message: format!("site {} completed", site.name),
                    progress: None,
                },
            );
            bump_job_counter(store, job_id, true).await?;
        }
        Err(e) => {
            finish_site_as_error(store, &mut site, &mut dataset, &e.to_string()).await?;
            bump_job_counter(store, job_id, false).await?;
        }
    }

    Ok(())
}

async fn finish_site_as_error(
    store: &Store,
    site: &mut BatchSite,
    dataset: &mut Dataset,
    message: &str,
) -> Result<()> {
    dataset.status = DatasetStatus::Error;
    store.update_dataset(dataset).await?;

    site.status = BatchSiteStatus::Error;
    site.error_message = Some(message.to_string());
    site.finished_at = Some(Utc::now().naive_utc());
    store.update_site(site).await?;
    Ok(())
}

/// Refreshes the job row before writing its counters, so two sites
/// completing concurrently cannot lose one another's increment
/// (`spec.md` §4.7 step i, §5 "refresh-then-write").
async fn bump_job_counter(store: &Store, job_id: i64, succeeded: bool) -> Result<()> {
    let mut job: BatchJob = store.get_job(job_id).await?.context("owning job vanished")?;
    if succeeded {
        job.completed_sites += 1;
    } else {
        job.failed_sites += 1;
    }
    store.update_job(&job).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use crate::model::{AcquisitionFilters, BatchJobStatus, SiteOverrides};
    use chrono::NaiveDate;

    fn config() -> BaeConfig {
        let mut cfg = BaeConfig::default();
        cfg.default_site_workers = 2;
        cfg.default_batch_size = 2;
        cfg
    }

    async fn job_fixture(store: &Store, batch_size: i64) -> BatchJob {
        let job = BatchJob {
            id: 0,
            name: "job".into(),
            created_at: Utc::now().naive_utc(),
            status: BatchJobStatus::Pending,
            source_file: None,
            total_sites: 1,
            completed_sites: 0,
            failed_sites: 0,
            default_radius_km: 10.0,
            default_date_start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_date_end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_weekday_mask: vec![],
            default_hours: vec![16],
            default_filters: AcquisitionFilters {
                max_cloud_fraction: 0.5,
                max_solar_zenith_angle: 70.0,
            },
            batch_size,
            last_processed_at: None,
            error_message: None,
        };
        store.create_job(job).await.unwrap()
    }

    /// Minimal single-response mock granule service, grounded on the
    /// teacher's raw-`TcpListener` range server: every connection gets the
    /// same fixed body back regardless of the request line.
    fn start_granule_server(body: Vec<u8>) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                respond_once(stream, &body);
            }
        });
        format!("http://127.0.0.1:{port}/granule")
    }

    fn respond_once(mut stream: std::net::TcpStream, body: &[u8]) {
        use std::io::{Read, Write};
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(header.as_bytes());
        let _ = stream.write_all(body);
    }

    #[tokio::test]
    async fn run_job_marks_granule_rows_downloaded_after_a_successful_fetch() {
        let data_dir = tempfile::tempdir().unwrap();
        let store = Store::open(data_dir.path()).await.unwrap();

        // One variable per padding byte pushes the body past the
        // Site Downloader's 1000-byte minimum valid file size.
        let body = serde_json::json!({
            "NO2_TropVCD": 2.0,
            "HCHO_TotVCD": 4.0,
            "_pad": "x".repeat(1100),
        });
        let base_url = start_granule_server(serde_json::to_vec(&body).unwrap());

        let job = BatchJob {
            id: 0,
            name: "job".into(),
            created_at: Utc::now().naive_utc(),
            status: BatchJobStatus::Pending,
            source_file: None,
            total_sites: 1,
            completed_sites: 0,
            failed_sites: 0,
            default_radius_km: 10.0,
            default_date_start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_date_end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            default_weekday_mask: vec![5], // 2024-06-01 is a Saturday
            default_hours: vec![16],
            default_filters: AcquisitionFilters {
                max_cloud_fraction: 0.5,
                max_solar_zenith_angle: 70.0,
            },
            batch_size: 1,
            last_processed_at: None,
            error_message: None,
        };
        let job = store.create_job(job).await.unwrap();
        let site = BatchSite {
            id: 0,
            job_id: job.id,
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
            status: BatchSiteStatus::Pending,
            dataset_id: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            sequence_number: 1,
            overrides: SiteOverrides::default(),
        };
        store.create_sites_batch(&[site]).await.unwrap();

        let mut cfg = config();
        cfg.remote_base_url = base_url;

        let control = JobControl::new();
        let status = run_job(&store, &control, &cfg, job.id, |_e| {}).await.unwrap();
        assert_eq!(status, BatchJobStatus::Completed);

        let sites = store.get_sites(job.id).await.unwrap();
        assert_eq!(sites[0].status, BatchSiteStatus::Completed);
        let dataset_id = sites[0].dataset_id.unwrap();

        let granules = store.get_granules_for_dataset(dataset_id).await.unwrap();
        assert_eq!(granules.len(), 1);
        assert!(granules[0].downloaded);
        assert!(granules[0].downloaded_at.is_some());
        assert!(granules[0].file_path.is_some());
        assert!(granules[0].file_size_bytes.unwrap() >= 1000);

        // `find_granule_by_hash` only ever sees a row production code has
        // actually marked downloaded — this is the path that was dead
        // before granule rows were updated.
        let found = store.find_granule_by_hash(&granules[0].content_hash).await.unwrap();
        assert_eq!(found.unwrap().id, granules[0].id);
    }

    #[tokio::test]
    async fn empty_weekday_mask_leaves_no_planned_granules_and_site_errors() {
        let store = Store::open_in_memory().await.unwrap();
        let job = job_fixture(&store, 2).await;
        let site = BatchSite {
            id: 0,
            job_id: job.id,
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
            status: BatchSiteStatus::Pending,
            dataset_id: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            sequence_number: 1,
            overrides: SiteOverrides::default(),
        };
        store.create_sites_batch(&[site]).await.unwrap();

        let control = JobControl::new();
        let status = run_job(&store, &control, &config(), job.id, |_e| {}).await.unwrap();
        assert_eq!(status, BatchJobStatus::Completed);

        let sites = store.get_sites(job.id).await.unwrap();
        assert_eq!(sites[0].status, BatchSiteStatus::Error);
        assert_eq!(sites[0].error_message.as_deref(), Some("No files downloaded"));

        let refreshed = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(refreshed.failed_sites, 1);
    }

    #[tokio::test]
    async fn rejects_rerun_of_already_running_job() {
        let store = Store::open_in_memory().await.unwrap();
        let mut job = job_fixture(&store, 1).await;
        job.status = BatchJobStatus::Running;
        store.update_job(&job).await.unwrap();

        let control = JobControl::new();
        let result = run_job(&store, &control, &config(), job.id, |_e| {}).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn no_pending_sites_completes_immediately_when_counts_satisfied() {
        let store = Store::open_in_memory().await.unwrap();
        let mut job = job_fixture(&store, 1).await;
        job.total_sites = 0;
        store.update_job(&job).await.unwrap();

        let control = JobControl::new();
        let status = run_job(&store, &control, &config(), job.id, |_e| {}).await.unwrap();
        assert_eq!(status, BatchJobStatus::Completed);
    }

    #[tokio::test]
    async fn rerunning_a_completed_job_is_a_pure_no_op() {
        let store = Store::open_in_memory().await.unwrap();
        let mut job = job_fixture(&store, 1).await;
        job.status = BatchJobStatus::Completed;
        job.last_processed_at = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
        store.update_job(&job).await.unwrap();

        let control = JobControl::new();
        let status = run_job(&store, &control, &config(), job.id, |_e| {}).await.unwrap();
        assert_eq!(status, BatchJobStatus::Completed);

        // run_job must not have touched the row at all: last_processed_at
        // stays at the sentinel value instead of being bumped to "now".
        let refreshed = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(refreshed.last_processed_at, job.last_processed_at);
    }
}
