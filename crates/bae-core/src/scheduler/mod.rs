//! Batch Scheduler: drives a `BatchJob` through its sites
//! (`spec.md` §4.7), one level above the Site Downloader's per-granule pool.

mod batch;

pub use batch::{run_job, ProgressEvent, ProgressKind};
