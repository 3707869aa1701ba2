//! CLI command handlers. Each command is in its own file for clarity and line limit.

mod import;
mod pause;
mod remove;
mod resume;
mod run;
mod status;

pub use import::run_import;
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use run::run_job;
pub use status::run_status;
