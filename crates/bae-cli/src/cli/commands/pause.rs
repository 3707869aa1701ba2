//! `bae pause <id>` – signal pause on a running job.
//!
//! Pause is a live signal, not a DB write: the Batch Scheduler only stops at
//! a suspension point (`spec.md` §5) and writes the terminal `PAUSED` status
//! itself when the in-flight `bae run <id>` process observes it.

use anyhow::{bail, Context, Result};
use bae_core::model::BatchJobStatus;
use bae_core::store::Store;

use crate::cli::control_socket;

pub async fn run_pause(store: &Store, id: i64) -> Result<()> {
    let job = store
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    if job.status != BatchJobStatus::Running {
        bail!("job {id} is not running (status: {})", job.status.as_str());
    }
    control_socket::send_pause(id).await?;
    println!("Requested pause for job {id}");
    Ok(())
}
