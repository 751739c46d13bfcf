//! In-memory record store implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{ExtraRow, Record, RecordId, RecordStore, SaveOptions, StoreError, StoreResult, matches_any, now_millis};

/// An in-memory record store backed by a HashMap.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<RecordId, Record>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a store seeded with the given records.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let data = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn scan_extra(&self, needles: &[String]) -> StoreResult<Vec<StoreResult<ExtraRow>>> {
        let data = self
            .data
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut rows: Vec<ExtraRow> = data
            .values()
            .filter(|r| matches_any(&r.extra, needles))
            .map(Record::row)
            .collect();
        rows.sort_by_key(|r| r.record_id);
        Ok(rows.into_iter().map(Ok).collect())
    }

    fn get(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let data = self
            .data
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(data.get(&id).cloned())
    }

    fn put(&self, record: &Record) -> StoreResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        data.insert(record.id, record.clone());
        Ok(())
    }

    fn update_extra(&self, id: RecordId, extra: &str, opts: SaveOptions) -> StoreResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let record = data.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.extra = extra.to_string();
        if !opts.skip_date_modified {
            record.date_modified = now_millis();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needles() -> Vec<String> {
        vec!["bibtex:".to_string(), "biblatexcitekey[".to_string()]
    }

    #[test]
    fn test_basic_operations() {
        let store = MemoryStore::new();

        store.put(&Record::new(1, None, "bibtex: a")).unwrap();
        assert_eq!(store.get(1).unwrap().unwrap().extra, "bibtex: a");

        // Non-existent record
        assert_eq!(store.get(2).unwrap(), None);
    }

    #[test]
    fn test_scan_prefilter() {
        let store = MemoryStore::with_records([
            Record::new(3, Some(1), "x\nbibtex: k3"),
            Record::new(1, None, "biblatexcitekey[k1]"),
            Record::new(2, None, "nothing"),
        ]);

        let rows: Vec<ExtraRow> = store
            .scan_extra(&needles())
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record_id, 1);
        assert_eq!(rows[0].library_id, 0);
        assert_eq!(rows[1].record_id, 3);
        assert_eq!(rows[1].library_id, 1);

        assert!(store.scan_extra(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_update_extra_date_modified() {
        let mut r = Record::new(1, None, "old");
        r.date_modified = 42;
        let store = MemoryStore::with_records([r]);

        store
            .update_extra(1, "new", SaveOptions::skip_date_modified())
            .unwrap();
        let got = store.get(1).unwrap().unwrap();
        assert_eq!(got.extra, "new");
        assert_eq!(got.date_modified, 42);

        store.update_extra(1, "newer", SaveOptions::default()).unwrap();
        let got = store.get(1).unwrap().unwrap();
        assert_eq!(got.extra, "newer");
        assert_ne!(got.date_modified, 42);
    }

    #[test]
    fn test_update_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .update_extra(5, "x", SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(5)));
    }
}
