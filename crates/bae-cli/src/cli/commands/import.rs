//! `bae import <file>` – parse a site list and create a batch job.

use anyhow::{bail, Context, Result};
use bae_core::geo::bbox_from_center;
use bae_core::import::parse_import_file;
use bae_core::model::{
    AcquisitionFilters, BatchJob, BatchJobStatus, BatchSite, BatchSiteStatus, SiteOverrides,
};
use bae_core::store::Store;
use chrono::NaiveDate;
use std::path::Path;

const DATE_FMT: &str = "%Y-%m-%d";

#[allow(clippy::too_many_arguments)]
pub async fn run_import(
    store: &Store,
    path: &Path,
    name: Option<String>,
    default_radius_km: f64,
    date_start: &str,
    date_end: &str,
    hours: Vec<u32>,
    max_cloud: f64,
    max_sza: f64,
) -> Result<()> {
    let parsed = parse_import_file(path);
    if !parsed.is_valid() {
        for err in &parsed.errors {
            eprintln!("error: {err}");
        }
        bail!("import file has {} error(s)", parsed.errors.len());
    }
    for warning in &parsed.warnings {
        eprintln!("warning: {warning}");
    }

    let valid_sites: Vec<_> = parsed.valid_sites().into_iter().cloned().collect();
    if valid_sites.is_empty() {
        bail!("no valid sites found in {}", path.display());
    }

    let date_start = NaiveDate::parse_from_str(date_start, DATE_FMT).context("--date-start")?;
    let date_end = NaiveDate::parse_from_str(date_end, DATE_FMT).context("--date-end")?;

    let job_name = name.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("import")
            .to_string()
    });

    let job = BatchJob {
        id: 0,
        name: job_name,
        created_at: chrono::Utc::now().naive_utc(),
        status: BatchJobStatus::Pending,
        source_file: Some(path.display().to_string()),
        total_sites: valid_sites.len() as i64,
        completed_sites: 0,
        failed_sites: 0,
        default_radius_km,
        default_date_start: date_start,
        default_date_end: date_end,
        default_weekday_mask: (0u8..=6).collect(),
        default_hours: hours,
        default_filters: AcquisitionFilters {
            max_cloud_fraction: max_cloud,
            max_solar_zenith_angle: max_sza,
        },
        // 0 tells the Batch Scheduler to fall back to `config.default_batch_size`.
        batch_size: 0,
        last_processed_at: None,
        error_message: None,
    };
    let job = store.create_job(job).await?;

    let sites: Vec<BatchSite> = valid_sites
        .iter()
        .enumerate()
        .map(|(idx, parsed)| {
            let radius_km = parsed.custom_radius_km.unwrap_or(job.default_radius_km);
            BatchSite {
                id: 0,
                job_id: job.id,
                name: parsed.site_name.clone(),
                lat: parsed.latitude,
                lon: parsed.longitude,
                radius_km,
                bbox: bbox_from_center(parsed.latitude, parsed.longitude, radius_km),
                status: BatchSiteStatus::Pending,
                dataset_id: None,
                error_message: None,
                started_at: None,
                finished_at: None,
                sequence_number: idx as i64 + 1,
                overrides: SiteOverrides {
                    date_start: parsed
                        .custom_date_start
                        .as_deref()
                        .and_then(|s| NaiveDate::parse_from_str(s, DATE_FMT).ok()),
                    date_end: parsed
                        .custom_date_end
                        .as_deref()
                        .and_then(|s| NaiveDate::parse_from_str(s, DATE_FMT).ok()),
                    hour_start: parsed.custom_hour_start,
                    hour_end: parsed.custom_hour_end,
                    max_cloud_fraction: parsed.custom_max_cloud,
                    max_solar_zenith_angle: parsed.custom_max_sza,
                },
            }
        })
        .collect();
    store.create_sites_batch(&sites).await?;

    println!(
        "Imported job {} \"{}\" with {} site(s) ({} skipped with errors)",
        job.id,
        job.name,
        sites.len(),
        parsed.invalid_sites().len()
    );
    Ok(())
}
