//! Granule Fetcher: a single bounded HTTP GET against the remote sensor
//! service, classified into the outcome categories the Site Downloader acts
//! on (`spec.md` §4.4).
//!
//! Adapted from `downloader/single.rs`'s curl transfer, but collects the
//! body into memory instead of writing through a `StorageWriter` — a
//! granule response is small enough, and the caller decides whether the
//! bytes are worth writing to disk at all.

mod decode;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::control::{JobAborted, JobTokens};

pub use decode::naive;

/// What a single fetch attempt produced, mirroring the Site Downloader's
/// per-granule branches (`spec.md` §4.5 step 4).
#[derive(Debug)]
pub enum Outcome {
    /// The service had data for this `(date, hour)`; bytes are the raw body.
    HasData(Vec<u8>),
    /// The service responded successfully but reported no data for this
    /// `(date, hour)` — not an error, no retry.
    NoData,
    /// A retryable failure: timeout, 429, or 5xx.
    Transient(String),
    /// A non-retryable failure: 4xx (other than 429), malformed response.
    Fatal(String),
}

/// Decides whether a successful response body represents real data, kept as
/// a trait so the wire format can change without touching the fetch loop
/// (`DESIGN.md` Open Question decision on the Fetcher's wire format).
pub trait GranulePayload {
    fn has_data(bytes: &[u8]) -> Result<bool>;
}

/// Performs one GET, honoring `timeout` and cooperative cancellation via
/// `tokens`. Returns `Err(JobAborted)` if the job was paused/cancelled
/// before the request could start; otherwise always returns `Ok(Outcome)`,
/// even for failures, since those are the caller's data to act on, not
/// Rust-level errors.
pub fn fetch_granule<P: GranulePayload>(
    url: &str,
    headers: &HashMap<String, String>,
    timeout: Duration,
    tokens: &JobTokens,
) -> Result<Outcome> {
    if tokens.should_stop() {
        return Err(JobAborted.into());
    }

    // Scratch directory for this call only, deleted on every exit path —
    // dropped at the end of this function's scope (`spec.md` §4.4).
    let _scratch_dir = tempfile::tempdir().context("creating fetch scratch directory")?;

    let body = Arc::new(std::sync::Mutex::new(Vec::new()));
    let body_cb = Arc::clone(&body);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !headers.is_empty() {
        easy.http_headers(list)?;
    }

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.write_function(move |data| {
            body_cb.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if e.is_operation_timedout() {
            return Ok(Outcome::Transient(format!("request timed out after {timeout:?}")));
        }
        return Ok(Outcome::Transient(format!("transport error: {e}")));
    }

    let code = easy.response_code().context("no response code")?;
    let bytes = Arc::try_unwrap(body)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();

    classify_response(code, bytes, P::has_data)
}

fn classify_response(
    code: u32,
    bytes: Vec<u8>,
    has_data: impl Fn(&[u8]) -> Result<bool>,
) -> Result<Outcome> {
    if code == 429 || (500..600).contains(&code) {
        return Ok(Outcome::Transient(format!("HTTP {code}")));
    }
    if (400..500).contains(&code) {
        return Ok(Outcome::Fatal(format!("HTTP {code}")));
    }
    if !(200..300).contains(&code) {
        return Ok(Outcome::Fatal(format!("unexpected HTTP {code}")));
    }

    match has_data(&bytes) {
        Ok(true) => Ok(Outcome::HasData(bytes)),
        Ok(false) => Ok(Outcome::NoData),
        Err(e) => Ok(Outcome::Fatal(format!("malformed response body: {e}"))),
    }
}
