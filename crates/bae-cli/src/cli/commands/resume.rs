//! `bae resume <id>` – re-enter `run` on a paused or errored job.

use anyhow::{bail, Context, Result};
use bae_core::config::BaeConfig;
use bae_core::store::Store;

use super::run::run_job;

pub async fn run_resume(store: &Store, config: &BaeConfig, id: i64) -> Result<()> {
    let job = store
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    if !job.status.is_resumable() {
        bail!(
            "job {id} cannot be resumed from status {}",
            job.status.as_str()
        );
    }
    run_job(store, config, id).await
}
