//! v001 -- Initial schema creation.
//!
//! One `records` table holds every collection.  `seq` is the insertion order
//! that `all` / `for_trip` return rows in; an upsert keeps the original `seq`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,                 -- trips, members, payments, ...
    id         TEXT NOT NULL,                 -- UUID v4
    trip_id    TEXT,                          -- owning trip, NULL for trips/rates
    body       TEXT NOT NULL,                 -- JSON row
    updated_at TEXT NOT NULL,                 -- RFC-3339

    UNIQUE (collection, id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
