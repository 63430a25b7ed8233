//! # tripcover-store
//!
//! The record store behind the trip coverage engine.
//!
//! Every domain row lives in a named collection and is persisted as a JSON
//! body keyed by `(collection, id)`.  Rows come back in insertion order.  The
//! crate ships two implementations of [`RecordStore`]:
//!
//! - [`Database`] wraps a `rusqlite::Connection` and runs schema migrations
//!   on open.
//! - [`MemoryStore`] keeps everything in process and is what the engine tests
//!   run against.
//!
//! Referential integrity is not enforced here; the engine cascades deletes
//! itself through [`RecordStore::remove_for_trip`].

pub mod database;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod record;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use models::*;
pub use record::{Collection, Record, RecordStore};
