//! SQLite-based relay storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::{KeyStore, StagingStore};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied. The staging table is not part of the schema:
/// it only exists while an import runs.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Relay cursor and cached identifiers
            CREATE TABLE keystore (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        ),
    ])
}

const STAGING_TABLE: &str = "staging_pages";

/// SQLite-based relay storage
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and bring the schema up to date
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        debug!("Opened database at {}", db_path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Open a private in-memory database (for tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        // WAL keeps the cursor write cheap after every forwarded post;
        // NORMAL sync is safe with WAL.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn staging_exists(conn: &Connection) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            [STAGING_TABLE],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl KeyStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row("SELECT value FROM keystore WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO keystore (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')",
            params![key, value],
        )
        .with_context(|| format!("Failed to persist '{}'", key))?;
        Ok(())
    }
}

impl StagingStore for SqliteStore {
    fn create_staging_page(&self, seq: u32, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {STAGING_TABLE} (
                seq INTEGER PRIMARY KEY,
                rendered TEXT NOT NULL
            );"
        ))?;
        conn.execute(
            &format!(
                "INSERT INTO {STAGING_TABLE} (seq, rendered) VALUES (?, ?)
                 ON CONFLICT(seq) DO UPDATE SET rendered = excluded.rendered"
            ),
            params![seq, value],
        )
        .with_context(|| format!("Failed to stage page {}", seq))?;
        Ok(())
    }

    fn read_staging_page(&self, seq: u32) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        if !Self::staging_exists(&conn)? {
            return Ok(None);
        }
        let value = conn
            .query_row(
                &format!("SELECT rendered FROM {STAGING_TABLE} WHERE seq = ?"),
                [seq],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn delete_staging_page(&self, seq: u32) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        if Self::staging_exists(&conn)? {
            conn.execute(&format!("DELETE FROM {STAGING_TABLE} WHERE seq = ?"), [seq])?;
        }
        Ok(())
    }

    fn staging_page_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        if !Self::staging_exists(&conn)? {
            return Ok(0);
        }
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {STAGING_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn drop_staging(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {STAGING_TABLE};"))
            .context("Failed to drop staging table")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("drasta.test.sqlite");
        let store = SqliteStore::new(&db_path).unwrap();
        (store, dir)
    }

    #[test]
    fn test_keystore_upsert() {
        let (store, _dir) = create_test_store();

        assert!(store.get("last_statusid").unwrap().is_none());
        store.set("last_statusid", "100").unwrap();
        store.set("last_statusid", "101").unwrap();
        store.set("channel_id", "-1001").unwrap();

        assert_eq!(store.get("last_statusid").unwrap().as_deref(), Some("101"));
        assert_eq!(store.get("channel_id").unwrap().as_deref(), Some("-1001"));
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("drasta.test.sqlite");

        {
            let store = SqliteStore::new(&db_path).unwrap();
            store.set("last_statusid", "555").unwrap();
        }

        let store = SqliteStore::new(&db_path).unwrap();
        assert_eq!(store.get("last_statusid").unwrap().as_deref(), Some("555"));
    }

    #[test]
    fn test_staging_without_table() {
        let (store, _dir) = create_test_store();

        assert!(store.read_staging_page(1).unwrap().is_none());
        assert_eq!(store.staging_page_count().unwrap(), 0);
        store.delete_staging_page(1).unwrap();
        store.drop_staging().unwrap();
    }

    #[test]
    fn test_staging_pages() {
        let (store, _dir) = create_test_store();

        store.create_staging_page(1, r#"["one"]"#).unwrap();
        store.create_staging_page(2, r#"["two"]"#).unwrap();
        store.create_staging_page(2, r#"["two again"]"#).unwrap();
        assert_eq!(store.staging_page_count().unwrap(), 2);
        assert_eq!(
            store.read_staging_page(2).unwrap().as_deref(),
            Some(r#"["two again"]"#)
        );

        store.delete_staging_page(2).unwrap();
        assert_eq!(store.staging_page_count().unwrap(), 1);

        store.drop_staging().unwrap();
        assert_eq!(store.staging_page_count().unwrap(), 0);
        assert!(store.read_staging_page(1).unwrap().is_none());
    }

    #[test]
    fn test_in_memory_database() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("channel_id", "7").unwrap();
        assert_eq!(store.get("channel_id").unwrap().as_deref(), Some("7"));
    }
}
