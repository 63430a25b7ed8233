//! SQLite-backed [`RecordStore`].
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::migrations;
use crate::record::{Record, RecordStore};

const SAVEPOINT: &str = "tripcover_tx";

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/tripcover/tripcover.db`
    /// - macOS:   `~/Library/Application Support/com.tripcover.tripcover/tripcover.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\tripcover\tripcover\data\tripcover.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "tripcover", "tripcover").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("tripcover.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::init(conn)
    }

    /// Open a private, non-persistent database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    fn query_bodies<R: Record>(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for body in rows {
            out.push(serde_json::from_str(&body?)?);
        }
        Ok(out)
    }
}

impl RecordStore for Database {
    fn insert<R: Record>(&mut self, row: &R) -> Result<()> {
        let body = serde_json::to_string(row)?;
        let id = row.record_id();

        self.conn
            .execute(
                "INSERT INTO records (collection, id, trip_id, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    R::COLLECTION.as_str(),
                    id.to_string(),
                    row.trip_ref().map(|t| t.to_string()),
                    body,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict {
                        collection: R::COLLECTION.as_str(),
                        id,
                    }
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    fn put<R: Record>(&mut self, row: &R) -> Result<()> {
        let body = serde_json::to_string(row)?;

        self.conn.execute(
            "INSERT INTO records (collection, id, trip_id, body, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (collection, id) DO UPDATE SET
                 trip_id    = excluded.trip_id,
                 body       = excluded.body,
                 updated_at = excluded.updated_at",
            params![
                R::COLLECTION.as_str(),
                row.record_id().to_string(),
                row.trip_ref().map(|t| t.to_string()),
                body,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn by_id<R: Record>(&self, id: Uuid) -> Result<Option<R>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![R::COLLECTION.as_str(), id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    fn all<R: Record>(&self) -> Result<Vec<R>> {
        self.query_bodies(
            "SELECT body FROM records WHERE collection = ?1 ORDER BY seq ASC",
            &[&R::COLLECTION.as_str()],
        )
    }

    fn for_trip<R: Record>(&self, trip_id: Uuid) -> Result<Vec<R>> {
        self.query_bodies(
            "SELECT body FROM records
             WHERE collection = ?1 AND trip_id = ?2
             ORDER BY seq ASC",
            &[&R::COLLECTION.as_str(), &trip_id.to_string()],
        )
    }

    fn remove<R: Record>(&mut self, id: Uuid) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![R::COLLECTION.as_str(), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    fn remove_for_trip<R: Record>(&mut self, trip_id: Uuid) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND trip_id = ?2",
            params![R::COLLECTION.as_str(), trip_id.to_string()],
        )?;
        Ok(affected)
    }

    fn transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        // Savepoints nest, so a transaction may open inside another one.
        self.conn
            .execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))
            .map_err(|e| E::from(StoreError::Sqlite(e)))?;

        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {SAVEPOINT}"))
                    .map_err(|e| E::from(StoreError::Sqlite(e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"))
                {
                    tracing::error!(error = %rollback, "failed to roll back savepoint");
                }
                Err(err)
            }
        }
    }
}
