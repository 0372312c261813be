//! `SQLite` metadata store and migration runner.
//!
//! Key records are JSON documents in a single `keys` table. The schema is
//! versioned with `PRAGMA user_version` and upgraded by forward-only
//! migrations embedded at compile time.

use std::fmt;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::VaultError;
use crate::store::MetadataStore;

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// `(user_version after applying, SQL)`, in ascending order.
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("../migrations/001_keys.sql"))];

/// Schema version of a fully migrated database.
pub const SCHEMA_VERSION: i32 = 1;

// ---------------------------------------------------------------------------
// SqliteMetadataStore
// ---------------------------------------------------------------------------

/// Handle to an open, migrated metadata database.
pub struct SqliteMetadataStore {
    conn: Connection,
}

impl fmt::Debug for SqliteMetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SqliteMetadataStore")
    }
}

impl SqliteMetadataStore {
    /// Open (or create) the metadata database at `path` and run pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Database`] if the file cannot be opened.
    /// - [`VaultError::Migration`] if a migration fails.
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        debug!(path = %path.display(), "opening metadata database");
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_in_memory() -> Result<Self, VaultError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, VaultError> {
        let mut db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Returns the current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the pragma query fails.
    pub fn schema_version(&self) -> Result<i32, VaultError> {
        let v: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(v)
    }

    /// Bring the schema up to [`SCHEMA_VERSION`].
    ///
    /// One transaction per step; `user_version` moves with the commit, so a
    /// failed step leaves the database at the previous version.
    fn run_migrations(&mut self) -> Result<(), VaultError> {
        let current = self.schema_version()?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            let failed =
                |step: &str, e: rusqlite::Error| VaultError::Migration(format!("v{version} {step}: {e}"));

            let tx = self.conn.transaction().map_err(|e| failed("begin", e))?;
            tx.execute_batch(sql).map_err(|e| failed("apply", e))?;
            tx.pragma_update(None, "user_version", version)
                .map_err(|e| failed("stamp", e))?;
            tx.commit().map_err(|e| failed("commit", e))?;

            debug!(version, "applied metadata migration");
        }
        Ok(())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, VaultError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM keys WHERE name = ?1",
                params![name],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, name: &str, value: &[u8]) -> Result<(), VaultError> {
        self.conn.execute(
            "INSERT INTO keys (name, value) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<bool, VaultError> {
        let removed = self
            .conn
            .execute("DELETE FROM keys WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<String>, VaultError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM keys ORDER BY name COLLATE BINARY")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}
