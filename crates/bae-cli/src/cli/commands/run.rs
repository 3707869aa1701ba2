//! `bae run <id>` – drive a job via the Batch Scheduler to a terminal state.

use anyhow::Result;
use bae_core::config::BaeConfig;
use bae_core::control::JobControl;
use bae_core::model::BatchJobStatus;
use bae_core::scheduler::{self, ProgressEvent, ProgressKind};
use bae_core::store::Store;
use std::sync::Arc;

use crate::cli::control_socket;

pub async fn run_job(store: &Store, config: &BaeConfig, id: i64) -> Result<()> {
    let control = Arc::new(JobControl::new());
    if let Ok(socket_path) = bae_core::control::default_control_socket_path() {
        if control_socket::spawn_control_listener(Arc::clone(&control), &socket_path).is_ok() {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
        }
    }

    let status = scheduler::run_job(store, &control, config, id, print_progress).await?;

    println!("Job {id} finished as {}", status.as_str());
    if status == BatchJobStatus::Error {
        anyhow::bail!("job {id} ended in error");
    }
    Ok(())
}

fn print_progress(event: ProgressEvent) {
    let marker = match event.kind {
        ProgressKind::Info => "info",
        ProgressKind::Download => "download",
        ProgressKind::Ok => "ok",
        ProgressKind::Warning => "warn",
        ProgressKind::Error => "error",
    };
    match (event.site_id, event.progress) {
        (Some(site_id), Some(p)) => {
            println!("[{marker}] site {site_id}: {} ({:.0}%)", event.message, p * 100.0)
        }
        (Some(site_id), None) => println!("[{marker}] site {site_id}: {}", event.message),
        (None, _) => println!("[{marker}] {}", event.message),
    }
}
