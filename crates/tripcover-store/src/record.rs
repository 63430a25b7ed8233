//! The generic collection abstraction shared by every store backend.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Named collections persisted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Trips,
    Members,
    Payments,
    Claims,
    History,
    Rates,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Trips => "trips",
            Collection::Members => "members",
            Collection::Payments => "payments",
            Collection::Claims => "claims",
            Collection::History => "history",
            Collection::Rates => "rates",
        }
    }
}

/// A row type that lives in exactly one collection.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    /// Unique id of the row within its collection.
    fn record_id(&self) -> Uuid;

    /// The trip this row belongs to, used for per-trip queries and cascades.
    fn trip_ref(&self) -> Option<Uuid> {
        None
    }
}

/// Synchronous CRUD over named collections.
///
/// All writes are durable when the call returns.  [`RecordStore::transaction`]
/// groups several writes so that either all of them or none of them persist.
pub trait RecordStore {
    /// Insert a new row.  Fails with [`StoreError::Conflict`] if the id exists.
    fn insert<R: Record>(&mut self, row: &R) -> Result<()>;

    /// Insert or replace a row.  A replaced row keeps its insertion position.
    fn put<R: Record>(&mut self, row: &R) -> Result<()>;

    fn by_id<R: Record>(&self, id: Uuid) -> Result<Option<R>>;

    /// Every row of the collection, in insertion order.
    fn all<R: Record>(&self) -> Result<Vec<R>>;

    /// Rows whose [`Record::trip_ref`] equals `trip_id`, in insertion order.
    fn for_trip<R: Record>(&self, trip_id: Uuid) -> Result<Vec<R>>;

    /// Delete a row.  Returns `true` if a row was deleted.
    fn remove<R: Record>(&mut self, id: Uuid) -> Result<bool>;

    /// Delete every row of the collection that belongs to `trip_id`.
    fn remove_for_trip<R: Record>(&mut self, trip_id: Uuid) -> Result<usize>;

    /// Run `f` as one unit: its writes are committed only if it returns `Ok`.
    fn transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<StoreError>;

    /// Rows matching `predicate`, in insertion order.
    fn filter<R, P>(&self, predicate: P) -> Result<Vec<R>>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        Ok(self
            .all::<R>()?
            .into_iter()
            .filter(|row| predicate(row))
            .collect())
    }

    /// Like [`RecordStore::by_id`] but a missing row is [`StoreError::NotFound`].
    fn get<R: Record>(&self, id: Uuid) -> Result<R> {
        self.by_id(id)?.ok_or(StoreError::NotFound)
    }
}
