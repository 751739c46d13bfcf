use serde::{Deserialize, Serialize};

/// Record identifier assigned by the host.
pub type RecordId = u64;

/// Library (scope) identifier.
pub type LibraryId = u64;

/// Library used when a record carries none.
pub const DEFAULT_LIBRARY: LibraryId = 0;

/// A host-owned bibliographic record, reduced to the fields the citekey
/// registry reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,

    /// Owning library. `None` means the default library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<LibraryId>,

    /// Free-text "extra" field. Absent is stored as empty.
    #[serde(default)]
    pub extra: String,

    /// Last modification, milliseconds since the Unix epoch.
    #[serde(default)]
    pub date_modified: i64,
}

impl Record {
    pub fn new(id: RecordId, library_id: Option<LibraryId>, extra: impl Into<String>) -> Self {
        Self {
            id,
            library_id,
            extra: extra.into(),
            date_modified: now_millis(),
        }
    }

    /// The record's library with the default applied.
    pub fn library(&self) -> LibraryId {
        self.library_id.unwrap_or(DEFAULT_LIBRARY)
    }

    pub fn row(&self) -> ExtraRow {
        ExtraRow {
            record_id: self.id,
            library_id: self.library(),
            extra: self.extra.clone(),
        }
    }
}

/// One row of the bulk `extra` scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraRow {
    pub record_id: RecordId,
    pub library_id: LibraryId,
    pub extra: String,
}

/// Options for field updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Leave `date_modified` unchanged.
    pub skip_date_modified: bool,
}

impl SaveOptions {
    pub fn skip_date_modified() -> Self {
        Self {
            skip_date_modified: true,
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
