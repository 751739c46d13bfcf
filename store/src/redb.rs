//! Redb-based persistent record store implementation.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::{ExtraRow, Record, RecordId, RecordStore, SaveOptions, StoreError, StoreResult, matches_any, now_millis};

const TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// A persistent record store backed by redb. Records are stored as
/// MessagePack.
pub struct RedbStore {
    db: Database,
}

fn storage<E: ToString>(e: E) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn encode(record: &Record) -> StoreResult<Vec<u8>> {
    rmp_serde::to_vec_named(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(id: RecordId, data: &[u8]) -> StoreResult<Record> {
    rmp_serde::from_slice(data)
        .map_err(|e| StoreError::Serialization(format!("record {id}: {e}")))
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Database::create(path).map_err(storage)?;

        // Create the table if it doesn't exist
        let tx = db.begin_write().map_err(storage)?;
        {
            let _ = tx.open_table(TABLE).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self { db })
    }

    /// Store raw bytes under a record id, bypassing encoding.
    #[cfg(test)]
    fn put_raw(&self, id: RecordId, data: &[u8]) -> StoreResult<()> {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            table.insert(id, data).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }
}

impl RecordStore for RedbStore {
    fn scan_extra(&self, needles: &[String]) -> StoreResult<Vec<StoreResult<ExtraRow>>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        for item in table.iter().map_err(storage)? {
            let (key, value) = item.map_err(storage)?;
            let id = key.value();
            match decode(id, value.value()) {
                Ok(record) if matches_any(&record.extra, needles) => results.push(Ok(record.row())),
                Ok(_) => {}
                Err(e) => results.push(Err(e)),
            }
        }
        Ok(results)
    }

    fn get(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;

        match table.get(id).map_err(storage)? {
            Some(value) => Ok(Some(decode(id, value.value())?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: &Record) -> StoreResult<()> {
        let data = encode(record)?;
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            table.insert(record.id, data.as_slice()).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn update_extra(&self, id: RecordId, extra: &str, opts: SaveOptions) -> StoreResult<()> {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            let mut record = match table.get(id).map_err(storage)? {
                Some(value) => decode(id, value.value())?,
                None => return Err(StoreError::NotFound(id)),
            };
            record.extra = extra.to_string();
            if !opts.skip_date_modified {
                record.date_modified = now_millis();
            }
            let data = encode(&record)?;
            table.insert(id, data.as_slice()).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redb_basic() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        let mut r = Record::new(1, Some(3), "bibtex: k1");
        r.date_modified = 10;
        store.put(&r).unwrap();
        assert_eq!(store.get(1).unwrap(), Some(r));
        assert_eq!(store.get(2).unwrap(), None);

        store
            .update_extra(1, "bibtex: k2", SaveOptions::skip_date_modified())
            .unwrap();
        let got = store.get(1).unwrap().unwrap();
        assert_eq!(got.extra, "bibtex: k2");
        assert_eq!(got.date_modified, 10);

        assert!(matches!(
            store.update_extra(2, "x", SaveOptions::default()),
            Err(StoreError::NotFound(2))
        ));
    }

    #[test]
    fn test_redb_scan_reports_corrupt_rows() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        store.put(&Record::new(1, None, "bibtex: a")).unwrap();
        store.put(&Record::new(2, None, "plain")).unwrap();
        store.put_raw(3, b"\xc1 not msgpack").unwrap();

        let rows = store.scan_extra(&["bibtex:".to_string()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().unwrap().record_id, 1);
        assert!(matches!(rows[1], Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_redb_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.put(&Record::new(7, None, "bibtex: kept")).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get(7).unwrap().unwrap().extra, "bibtex: kept");
    }
}
