use citekey_store::{LibraryId, RecordId, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("citekey: store error: {0}")]
    Store(#[from] StoreError),

    #[error("citekey: record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("citekey: invalid key {0:?}: must be non-empty and contain no whitespace")]
    InvalidKey(String),

    #[error("citekey: key {key:?} in library {library} is held by record {holder}")]
    KeyTaken {
        key: String,
        library: LibraryId,
        holder: RecordId,
    },

    #[error("citekey: record {record} text would parse as {parsed:?}, not {key:?}")]
    EmbedMismatch {
        record: RecordId,
        key: String,
        parsed: Option<String>,
    },

    #[error("citekey: config error: {0}")]
    Config(String),
}
