//! The citekey index.
//!
//! Two copies of a record's key exist: the durable one embedded in the
//! record's `extra` text, and the entry held here. `set` writes the text
//! first and the index second. A failure in between leaves the index one
//! step behind the store until the next [`Registry::bootstrap`].
//!
//! Edits to `extra` that bypass [`Registry::set`] are not observed. The
//! index reflects them after the next bootstrap.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use citekey_store::{LibraryId, Record, RecordId, RecordStore, SaveOptions};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::extract::{embed, extract, is_embeddable, strip};

/// One indexed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub record_id: RecordId,
    pub library_id: LibraryId,
    pub citekey: String,
}

/// Counters from a bootstrap scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Rows returned by the prefilter scan.
    pub scanned: usize,
    /// Rows that produced an index entry.
    pub indexed: usize,
    /// Rows that passed the prefilter but held no parsable key.
    pub no_key: usize,
    /// Rows the store could not read.
    pub unreadable: usize,
}

/// What [`Registry::set`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The record's text already carried the key. Nothing was written.
    Unchanged,
    /// The text was rewritten and the index updated.
    Assigned,
}

/// Scoped citekey index over a record store.
///
/// Operations take `&mut self` and assume a single caller. Hosts sharing a
/// registry across threads wrap the whole value in one lock.
pub struct Registry {
    store: Arc<dyn RecordStore>,
    config: RegistryConfig,
    entries: HashMap<RecordId, IndexEntry>,
    // library -> citekey -> holders. Legacy data may hold duplicates.
    by_key: HashMap<LibraryId, HashMap<String, BTreeSet<RecordId>>>,
}

impl Registry {
    /// Create an empty registry. Call [`Registry::bootstrap`] to populate it.
    pub fn new(store: Arc<dyn RecordStore>, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            entries: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    /// Create a registry and populate it from the store.
    pub fn init(
        store: Arc<dyn RecordStore>,
        config: RegistryConfig,
    ) -> Result<(Self, BootstrapReport), RegistryError> {
        let mut registry = Self::new(store, config);
        let report = registry.bootstrap()?;
        Ok((registry, report))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Rebuild the index from every record passing the prefilter.
    ///
    /// A failing scan returns the error and leaves the current index as it
    /// was. Individual unreadable records are logged and skipped.
    pub fn bootstrap(&mut self) -> Result<BootstrapReport, RegistryError> {
        debug!("citekey: parsing keys");
        let rows = self.store.scan_extra(&self.config.prefilter)?;

        self.entries.clear();
        self.by_key.clear();

        let mut report = BootstrapReport::default();
        for row in rows {
            report.scanned += 1;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("citekey: skipping record: {}", e);
                    report.unreadable += 1;
                    continue;
                }
            };
            debug!(
                "citekey: load record={} library={} extra={:?}",
                row.record_id, row.library_id, row.extra
            );
            match extract(&row.extra).key {
                Some(citekey) => {
                    self.upsert(IndexEntry {
                        record_id: row.record_id,
                        library_id: row.library_id,
                        citekey,
                    });
                    report.indexed += 1;
                }
                None => report.no_key += 1,
            }
        }

        info!(
            "citekey: bootstrap scanned={} indexed={} no_key={} unreadable={}",
            report.scanned, report.indexed, report.no_key, report.unreadable
        );
        Ok(report)
    }

    /// Assign `citekey` to `record`.
    ///
    /// Returns [`SetOutcome::Unchanged`] without touching anything when the
    /// text of `record` already carries `citekey`; writing a key fires a
    /// change notification in most hosts, which would otherwise call back
    /// into `set` with the same key.
    ///
    /// Otherwise the stored record is reloaded, every embedded key is
    /// stripped from its text, the new key is appended in primary notation
    /// and saved without bumping its modification date, and the index entry
    /// is replaced. Text that would not parse back to `citekey` is never
    /// written.
    ///
    /// Uniqueness is the caller's concern (see [`Registry::is_free`]) unless
    /// `reject_conflicts` is configured.
    pub fn set(&mut self, record: &Record, citekey: &str) -> Result<SetOutcome, RegistryError> {
        if !is_embeddable(citekey) {
            return Err(RegistryError::InvalidKey(citekey.to_string()));
        }

        if extract(&record.extra).key.as_deref() == Some(citekey) {
            debug!("citekey: record {} already has {}", record.id, citekey);
            return Ok(SetOutcome::Unchanged);
        }

        let current = self
            .store
            .get(record.id)?
            .ok_or(RegistryError::RecordNotFound(record.id))?;
        let library_id = current.library();

        if self.config.reject_conflicts {
            if let Some(holder) = self.other_holder(citekey, library_id, Some(current.id)) {
                return Err(RegistryError::KeyTaken {
                    key: citekey.to_string(),
                    library: library_id,
                    holder,
                });
            }
        }

        let extra = embed(&strip(&current.extra), citekey);
        let parsed = extract(&extra).key;
        if parsed.as_deref() != Some(citekey) {
            return Err(RegistryError::EmbedMismatch {
                record: current.id,
                key: citekey.to_string(),
                parsed,
            });
        }
        self.store
            .update_extra(current.id, &extra, SaveOptions::skip_date_modified())?;

        self.upsert(IndexEntry {
            record_id: current.id,
            library_id,
            citekey: citekey.to_string(),
        });
        info!(
            "citekey: record {} library {} set to {}",
            current.id, library_id, citekey
        );
        Ok(SetOutcome::Assigned)
    }

    /// Drop the index entry for a record. The record's text is not touched.
    pub fn clear(&mut self, record_id: RecordId) {
        if let Some(entry) = self.entries.remove(&record_id) {
            self.unlink(&entry);
            debug!("citekey: cleared record {}", record_id);
        }
    }

    /// True if no record in `library` holds `citekey`, ignoring `exclude`.
    ///
    /// Pass `exclude = None` for a record that does not exist yet, and the
    /// record's own id when checking a key for an existing record.
    pub fn is_free(&self, citekey: &str, library: LibraryId, exclude: Option<RecordId>) -> bool {
        match exclude {
            None => debug!("citekey: checking whether {} is free", citekey),
            Some(id) => debug!(
                "citekey: checking whether {} is taken by anyone else than {}",
                citekey, id
            ),
        }
        self.other_holder(citekey, library, exclude).is_none()
    }

    /// Index entry for a record.
    pub fn get(&self, record_id: RecordId) -> Option<&IndexEntry> {
        self.entries.get(&record_id)
    }

    /// All records in `library` holding `citekey`, in id order.
    pub fn holders(&self, citekey: &str, library: LibraryId) -> Vec<RecordId> {
        self.by_key
            .get(&library)
            .and_then(|keys| keys.get(citekey))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Keys in `library` held by more than one record, sorted by key.
    pub fn duplicates(&self, library: LibraryId) -> Vec<(String, Vec<RecordId>)> {
        let Some(keys) = self.by_key.get(&library) else {
            return Vec::new();
        };
        let mut dups: Vec<(String, Vec<RecordId>)> = keys
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| (key.clone(), ids.iter().copied().collect()))
            .collect();
        dups.sort_by(|a, b| a.0.cmp(&b.0));
        dups
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn other_holder(
        &self,
        citekey: &str,
        library: LibraryId,
        exclude: Option<RecordId>,
    ) -> Option<RecordId> {
        self.by_key
            .get(&library)?
            .get(citekey)?
            .iter()
            .copied()
            .find(|id| Some(*id) != exclude)
    }

    fn upsert(&mut self, entry: IndexEntry) {
        if let Some(old) = self.entries.remove(&entry.record_id) {
            self.unlink(&old);
        }
        self.by_key
            .entry(entry.library_id)
            .or_default()
            .entry(entry.citekey.clone())
            .or_default()
            .insert(entry.record_id);
        self.entries.insert(entry.record_id, entry);
    }

    fn unlink(&mut self, entry: &IndexEntry) {
        let Some(keys) = self.by_key.get_mut(&entry.library_id) else {
            return;
        };
        if let Some(ids) = keys.get_mut(&entry.citekey) {
            ids.remove(&entry.record_id);
            if ids.is_empty() {
                keys.remove(&entry.citekey);
            }
        }
        if keys.is_empty() {
            self.by_key.remove(&entry.library_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citekey_store::MemoryStore;

    fn registry_with(records: Vec<Record>) -> Registry {
        Registry::new(
            Arc::new(MemoryStore::with_records(records)),
            RegistryConfig::default(),
        )
    }

    #[test]
    fn test_upsert_replaces_by_record_id() {
        let mut reg = registry_with(vec![]);
        reg.upsert(IndexEntry {
            record_id: 1,
            library_id: 0,
            citekey: "a".into(),
        });
        reg.upsert(IndexEntry {
            record_id: 1,
            library_id: 0,
            citekey: "b".into(),
        });
        assert_eq!(reg.len(), 1);
        assert!(reg.is_free("a", 0, None));
        assert!(!reg.is_free("b", 0, None));
        assert!(reg.by_key[&0].get("a").is_none());
    }

    #[test]
    fn test_unlink_prunes_empty_maps() {
        let mut reg = registry_with(vec![]);
        reg.upsert(IndexEntry {
            record_id: 1,
            library_id: 4,
            citekey: "a".into(),
        });
        reg.clear(1);
        assert!(reg.is_empty());
        assert!(reg.by_key.is_empty());
    }

    #[test]
    fn test_duplicates_allowed_in_index() {
        let mut reg = registry_with(vec![]);
        for id in [3, 1] {
            reg.upsert(IndexEntry {
                record_id: id,
                library_id: 0,
                citekey: "dup".into(),
            });
        }
        assert_eq!(reg.holders("dup", 0), vec![1, 3]);
        assert_eq!(reg.duplicates(0), vec![("dup".to_string(), vec![1, 3])]);
        assert!(!reg.is_free("dup", 0, Some(1)));
        assert!(reg.duplicates(9).is_empty());
    }

    #[test]
    fn test_set_rejects_unembeddable_key() {
        let mut reg = registry_with(vec![Record::new(1, None, "")]);
        let r = Record::new(1, None, "");
        assert!(matches!(reg.set(&r, ""), Err(RegistryError::InvalidKey(_))));
        assert!(matches!(reg.set(&r, "a b"), Err(RegistryError::InvalidKey(_))));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_set_missing_record() {
        let mut reg = registry_with(vec![]);
        let r = Record::new(8, None, "");
        assert!(matches!(
            reg.set(&r, "k"),
            Err(RegistryError::RecordNotFound(8))
        ));
        assert!(reg.get(8).is_none());
    }
}
