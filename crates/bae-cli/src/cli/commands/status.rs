//! `bae status [id]` – list jobs, or show one job's sites and datasets.

use anyhow::{Context, Result};
use bae_core::store::Store;

pub async fn run_status(store: &Store, id: Option<i64>) -> Result<()> {
    match id {
        None => list_jobs(store).await,
        Some(id) => show_job(store, id).await,
    }
}

async fn list_jobs(store: &Store) -> Result<()> {
    let jobs = store.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<8} {:<8} {}", "ID", "STATUS", "DONE", "TOTAL", "NAME");
    for job in jobs {
        println!(
            "{:<6} {:<10} {:<8} {:<8} {}",
            job.id,
            job.status.as_str(),
            job.completed_sites + job.failed_sites,
            job.total_sites,
            job.name
        );
    }
    Ok(())
}

async fn show_job(store: &Store, id: i64) -> Result<()> {
    let job = store
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    println!(
        "job {} \"{}\" status={} sites={}/{} (failed {})",
        job.id,
        job.name,
        job.status.as_str(),
        job.completed_sites,
        job.total_sites,
        job.failed_sites
    );
    if let Some(msg) = &job.error_message {
        println!("  error: {msg}");
    }

    let sites = store.get_sites(job.id).await?;
    for site in sites {
        println!(
            "  site {:<4} {:<12} {}",
            site.id,
            site.status.as_str(),
            site.name
        );
        if let Some(dataset_id) = site.dataset_id {
            if let Some(dataset) = store.get_dataset(dataset_id).await? {
                println!(
                    "    dataset {} status={} granules={}/{} file={}",
                    dataset.id,
                    dataset.status.as_str(),
                    dataset.downloaded_granule_count,
                    dataset.planned_granule_count,
                    dataset.file_path.as_deref().unwrap_or("-")
                );
            }
        }
        if let Some(msg) = &site.error_message {
            println!("    error: {msg}");
        }
    }
    Ok(())
}
