pub mod config;
pub mod logging;

// BAE engine modules (`spec.md` §2 components A-I plus the ambient stack
// named in `SPEC_FULL.md` §2).
pub mod checksum;
pub mod combiner;
pub mod control;
pub mod fetch;
pub mod geo;
pub mod hash;
pub mod import;
pub mod model;
pub mod planner;
pub mod recovery;
pub mod remote;
pub mod sanitize;
pub mod scheduler;
pub mod site_downloader;
pub mod store;
