use rusqlite::Connection;

// Per-trip lookups (roster, ledger, history) and cascade deletes.
const UP_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_records_collection_trip
    ON records(collection, trip_id, seq);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
