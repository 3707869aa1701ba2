//! Job control for pause/cancel: shared one-way flags polled at suspension points.
//!
//! When the Batch Scheduler runs a job, it registers a `JobTokens` pair with
//! this registry. Anything with a handle to `JobControl` (e.g. a CLI `pause`
//! or `remove` invocation in another process run) can request pause or cancel
//! for a job id; the Scheduler and the Site Downloader poll the corresponding
//! token at every suspension point named in `spec.md` §5 and early-return.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Error returned when a run is stopped by a user pause/cancel request.
#[derive(Debug)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted by user")
    }
}

impl std::error::Error for JobAborted {}

/// The pair of one-way flags a running job polls. `cancel` takes priority
/// over `pause` if both are set: the spec's terminal-state rule (§4.7 step 8)
/// checks cancel first.
#[derive(Clone)]
pub struct JobTokens {
    cancel: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl JobTokens {
    fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            pause: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::Relaxed)
    }

    /// True if either flag is set — the point at which a worker must stop.
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.is_paused()
    }
}

/// Shared registry of job id -> tokens, used by the Batch Scheduler to pass a
/// token pair into each run and by anything requesting pause/cancel.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<i64, JobTokens>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running job; returns the tokens to thread through the run.
    pub fn register(&self, job_id: i64) -> JobTokens {
        let tokens = JobTokens::new();
        self.jobs.write().unwrap().insert(job_id, tokens.clone());
        tokens
    }

    /// Unregister a job (call when the run reaches a terminal state).
    pub fn unregister(&self, job_id: i64) {
        self.jobs.write().unwrap().remove(&job_id);
    }

    /// Request cancellation for a running job.
    pub fn request_cancel(&self, job_id: i64) {
        if let Some(tokens) = self.jobs.read().unwrap().get(&job_id) {
            tokens.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Request pause for a running job.
    pub fn request_pause(&self, job_id: i64) {
        if let Some(tokens) = self.jobs.read().unwrap().get(&job_id) {
            tokens.pause.store(true, Ordering::Relaxed);
        }
    }
}

/// Default path for the control socket a running `bae run` listens on and a
/// separate `bae pause`/`bae remove` invocation connects to (same XDG state
/// dir as the log file).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("bae")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_cancel_is_observed() {
        let control = JobControl::new();
        let tokens = control.register(1);
        assert!(!tokens.should_stop());
        control.request_cancel(1);
        assert!(tokens.is_cancelled());
        assert!(tokens.should_stop());
    }

    #[test]
    fn pause_and_cancel_are_independent() {
        let control = JobControl::new();
        let tokens = control.register(1);
        control.request_pause(1);
        assert!(tokens.is_paused());
        assert!(!tokens.is_cancelled());
    }

    #[test]
    fn unregistered_job_ignores_requests() {
        let control = JobControl::new();
        let tokens = control.register(1);
        control.unregister(1);
        control.request_cancel(1);
        assert!(!tokens.is_cancelled());
    }
}
