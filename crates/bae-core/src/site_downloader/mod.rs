//! Site Downloader: fetches every planned granule for one site with up to
//! `W` fetches in flight at once (`spec.md` §4.5, §5 — the inner of the two
//! concurrency levels, the outer being the Batch Scheduler's per-site pool).
//!
//! Bounded pool shape copied from `scheduler::parallel::run_jobs_parallel`'s
//! `JoinSet` loop; each fetch itself is the synchronous `curl::easy::Easy`
//! transfer in `fetch::fetch_granule`, run on a blocking thread since it is
//! not cancellation-aware mid-transfer.

mod save;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::control::JobTokens;
use crate::fetch::{self, GranulePayload, Outcome};
use crate::planner::PlannedGranule;

/// Per-granule result, enough for the caller to update Granule rows and
/// aggregate dataset-level counters (`spec.md` §4.5 step 4-6).
pub struct GranuleResult {
    pub granule: PlannedGranule,
    pub outcome: GranuleOutcome,
}

pub enum GranuleOutcome {
    Saved { path: PathBuf, size_bytes: u64 },
    NoData,
    Failed(String),
}

/// Minimum saved file size below which the Site Downloader discards the
/// file and treats the fetch as failed (`spec.md` §4.5 step 6, mirroring
/// `downloader.py::_save_granule`'s 1000-byte floor).
const MIN_VALID_FILE_BYTES: u64 = 1000;

/// Downloads every granule in `planned` into `site_dir`, up to `site_workers`
/// concurrent fetches. Returns one `GranuleResult` per planned granule,
/// regardless of outcome; the caller decides dataset/site status from these.
pub async fn download_site_granules<P>(
    site_dir: &Path,
    planned: Vec<PlannedGranule>,
    request_url: impl Fn(&PlannedGranule) -> String + Send + Sync + 'static,
    headers: HashMap<String, String>,
    timeout: Duration,
    site_workers: usize,
    tokens: JobTokens,
) -> Result<Vec<GranuleResult>>
where
    P: GranulePayload + Send + 'static,
{
    tokio::fs::create_dir_all(site_dir).await?;
    let site_workers = site_workers.max(1);
    let request_url = Arc::new(request_url);
    let headers = Arc::new(headers);

    let mut remaining = planned.into_iter();
    let mut join_set = tokio::task::JoinSet::new();
    let mut results = Vec::new();

    loop {
        while join_set.len() < site_workers {
            let Some(granule) = remaining.next() else { break };
            if tokens.should_stop() {
                break;
            }

            let site_dir = site_dir.to_path_buf();
            let url = (request_url)(&granule);
            let headers = Arc::clone(&headers);
            let tokens = tokens.clone();

            join_set.spawn(async move {
                tokio::task::spawn_blocking(move || {
                    fetch_and_save::<P>(&site_dir, &granule, &url, &headers, timeout, &tokens)
                })
                .await
                .map_err(|e| anyhow::anyhow!("fetch task join: {e}"))?
            });
        }

        if join_set.is_empty() {
            break;
        }
        let Some(joined) = join_set.join_next().await else {
            break;
        };
        results.push(joined??);
    }

    Ok(results)
}

fn fetch_and_save<P: GranulePayload>(
    site_dir: &Path,
    granule: &PlannedGranule,
    url: &str,
    headers: &HashMap<String, String>,
    timeout: Duration,
    tokens: &JobTokens,
) -> Result<GranuleResult> {
    let outcome = match fetch::fetch_granule::<P>(url, headers, timeout, tokens) {
        Ok(o) => o,
        Err(_) => {
            return Ok(GranuleResult {
                granule: granule.clone(),
                outcome: GranuleOutcome::Failed("job aborted".into()),
            })
        }
    };

    let result = match outcome {
        Outcome::HasData(bytes) => {
            let filename = format!("tempo_{}_{:02}.nc", granule.date.format("%Y-%m-%d"), granule.hour);
            let path = site_dir.join(filename);
            match save::save_granule_file(&path, &bytes, MIN_VALID_FILE_BYTES) {
                Ok(size_bytes) => GranuleOutcome::Saved { path, size_bytes },
                Err(e) => GranuleOutcome::Failed(e.to_string()),
            }
        }
        Outcome::NoData => GranuleOutcome::NoData,
        Outcome::Transient(msg) | Outcome::Fatal(msg) => GranuleOutcome::Failed(msg),
    };

    Ok(GranuleResult {
        granule: granule.clone(),
        outcome: result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct AlwaysHasData;
    impl GranulePayload for AlwaysHasData {
        fn has_data(_bytes: &[u8]) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn download_site_granules_respects_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let control = crate::control::JobControl::new();
        let tokens = control.register(1);
        let results = download_site_granules::<AlwaysHasData>(
            dir.path(),
            Vec::new(),
            |_g| "http://127.0.0.1:0/".to_string(),
            HashMap::new(),
            Duration::from_secs(1),
            2,
            tokens,
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn cancelled_tokens_stop_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let control = crate::control::JobControl::new();
        let tokens = control.register(1);
        control.request_cancel(1);
        let planned = vec![PlannedGranule {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            hour: 16,
        }];
        let results = download_site_granules::<AlwaysHasData>(
            dir.path(),
            planned,
            |_g| "http://127.0.0.1:0/".to_string(),
            HashMap::new(),
            Duration::from_secs(1),
            2,
            tokens,
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }
}
