//! Typed errors the engine must recognise rather than let leak as opaque
//! exceptions (`spec.md` §4.1: "row-write conflicts must not leak exceptions
//! through; they surface as typed errors the engine recognises").

/// A write lost a race against a concurrent update to the same row (e.g. two
/// workers refreshing and writing a job's counters without serialising on
/// the Store). Callers should refresh and retry, never propagate as fatal.
#[derive(Debug, thiserror::Error)]
pub enum RecoverableStoreError {
    #[error("row {table}:{id} was modified concurrently, refresh and retry")]
    WriteConflict { table: &'static str, id: i64 },
    #[error("row {table}:{id} not found")]
    NotFound { table: &'static str, id: i64 },
}
