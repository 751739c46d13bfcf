//! Registry configuration.
//!
//! ```yaml
//! prefilter:
//!   - "bibtex:"
//!   - "biblatexcitekey["
//! reject_conflicts: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::extract::{PRIMARY_MARKER, SECONDARY_MARKER};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Substrings a record's `extra` must contain to be considered during
    /// bootstrap. Records matching none are never parsed.
    pub prefilter: Vec<String>,

    /// Refuse `set` when another record in the same library already holds
    /// the key. Off by default: the key generator is trusted to have asked
    /// `is_free` first.
    pub reject_conflicts: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefilter: vec![PRIMARY_MARKER.to_string(), SECONDARY_MARKER.to_string()],
            reject_conflicts: false,
        }
    }
}

impl RegistryConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml(s: &str) -> Result<Self, RegistryError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(s).map_err(|e| RegistryError::Config(e.to_string()))
    }

    /// Load a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }
}
