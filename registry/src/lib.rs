//! Citekey registry.
//!
//! Keeps an in-memory index of the citation keys embedded in records'
//! `extra` text, scoped per library, and answers whether a candidate key is
//! still free.

pub mod config;
pub mod error;
pub mod extract;
pub mod registry;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use extract::{EmbeddedKey, Extraction, Syntax, embed, extract, find, strip};
pub use registry::{BootstrapReport, IndexEntry, Registry, SetOutcome};
