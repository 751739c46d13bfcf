//! Record store interface and implementations.
//!
//! Records are owned by the host application. The citekey registry only
//! needs a narrow view of them: a bulk scan over the free-text `extra`
//! field, lookup by id, and a field update that can leave the
//! modification timestamp alone.

pub mod memory;
pub mod record;
pub mod redb;

use std::fmt;
use thiserror::Error;

pub use record::{DEFAULT_LIBRARY, ExtraRow, LibraryId, Record, RecordId, SaveOptions, now_millis};

/// Errors that can occur in record store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: record not found: {0}")]
    NotFound(RecordId),

    #[error("store: storage error: {0}")]
    Storage(String),

    #[error("store: serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store trait.
pub trait RecordStore: Send + Sync {
    /// Return a row for every record whose `extra` contains at least one of
    /// `needles`.
    ///
    /// The outer result fails when the scan itself cannot run. Records that
    /// cannot be decoded show up as inner errors so callers can skip them.
    fn scan_extra(&self, needles: &[String]) -> StoreResult<Vec<StoreResult<ExtraRow>>>;

    /// Get a record by id.
    fn get(&self, id: RecordId) -> StoreResult<Option<Record>>;

    /// Insert or replace a record.
    fn put(&self, record: &Record) -> StoreResult<()>;

    /// Persist a new `extra` value for an existing record.
    fn update_extra(&self, id: RecordId, extra: &str, opts: SaveOptions) -> StoreResult<()>;
}

impl fmt::Debug for dyn RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordStore {{ ... }}")
    }
}

pub use memory::MemoryStore;
pub use redb::RedbStore;

/// True if `extra` contains any of the needles. An empty needle list matches
/// nothing.
pub(crate) fn matches_any(extra: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| extra.contains(n.as_str()))
}
