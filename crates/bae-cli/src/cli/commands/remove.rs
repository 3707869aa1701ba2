//! `bae remove <id>` – remove a job and all its sites, datasets, granules,
//! and on-disk files.

use anyhow::Result;
use bae_core::store::Store;

pub async fn run_remove(store: &Store, id: i64) -> Result<()> {
    store.delete_job_full(id).await?;
    println!("Removed job {id}");
    Ok(())
}
