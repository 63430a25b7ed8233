//! In-process [`RecordStore`] with the same semantics as [`Database`].
//!
//! Rows are kept as serialized JSON so that a value read back has gone
//! through exactly the same encode/decode path as a persisted one.
//!
//! [`Database`]: crate::Database

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::record::{Collection, Record, RecordStore};

#[derive(Debug, Clone)]
struct StoredRow {
    id: Uuid,
    trip_id: Option<Uuid>,
    body: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<Collection, Vec<StoredRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across every collection.
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rows(&self, collection: Collection) -> &[StoredRow] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn decode<'a, R: Record>(rows: impl Iterator<Item = &'a StoredRow>) -> Result<Vec<R>> {
        rows.map(|row| serde_json::from_str(&row.body).map_err(StoreError::from))
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn insert<R: Record>(&mut self, row: &R) -> Result<()> {
        let id = row.record_id();
        if self.rows(R::COLLECTION).iter().any(|r| r.id == id) {
            return Err(StoreError::Conflict {
                collection: R::COLLECTION.as_str(),
                id,
            });
        }

        let stored = StoredRow {
            id,
            trip_id: row.trip_ref(),
            body: serde_json::to_string(row)?,
        };
        self.collections
            .entry(R::COLLECTION)
            .or_default()
            .push(stored);
        Ok(())
    }

    fn put<R: Record>(&mut self, row: &R) -> Result<()> {
        let id = row.record_id();
        let body = serde_json::to_string(row)?;
        let rows = self.collections.entry(R::COLLECTION).or_default();

        match rows.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                existing.trip_id = row.trip_ref();
                existing.body = body;
            }
            None => rows.push(StoredRow {
                id,
                trip_id: row.trip_ref(),
                body,
            }),
        }
        Ok(())
    }

    fn by_id<R: Record>(&self, id: Uuid) -> Result<Option<R>> {
        self.rows(R::COLLECTION)
            .iter()
            .find(|r| r.id == id)
            .map(|r| serde_json::from_str(&r.body).map_err(StoreError::from))
            .transpose()
    }

    fn all<R: Record>(&self) -> Result<Vec<R>> {
        Self::decode(self.rows(R::COLLECTION).iter())
    }

    fn for_trip<R: Record>(&self, trip_id: Uuid) -> Result<Vec<R>> {
        Self::decode(
            self.rows(R::COLLECTION)
                .iter()
                .filter(|r| r.trip_id == Some(trip_id)),
        )
    }

    fn remove<R: Record>(&mut self, id: Uuid) -> Result<bool> {
        let Some(rows) = self.collections.get_mut(&R::COLLECTION) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }

    fn remove_for_trip<R: Record>(&mut self, trip_id: Uuid) -> Result<usize> {
        let Some(rows) = self.collections.get_mut(&R::COLLECTION) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| r.trip_id != Some(trip_id));
        Ok(before - rows.len())
    }

    fn transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let snapshot = self.collections.clone();
        let result = f(self);
        if result.is_err() {
            self.collections = snapshot;
        }
        result
    }
}
