use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::store::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
}

/// SQLite-backed key-value store.
///
/// Clones share one connection, so the same store can back the user store,
/// every per-user repository and the HTTP server at once.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        tracing::info!(path = %db_path.display(), "opening database");
        Self::from_connection(Connection::open(&db_path)?)
    }

    /// Open a database that lives only as long as this value.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        Ok(self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Get the filesystem path of the open database, if it has one
    pub fn path(&self) -> Option<PathBuf> {
        let conn = self.lock_conn().ok()?;
        conn.path()
            .filter(|p| !p.is_empty())
            .map(|p| Path::new(p).to_path_buf())
    }

    /// List every stored key in ascending order
    pub fn keys(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key ASC")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn read(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.lock_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![
                key,
                value,
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
    }

    fn delete_all(&self) -> Result<(), DatabaseError> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM kv", [])?;
        tx.commit()?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.write(key, value)?)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        Ok(self.delete(key)?)
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(self.delete_all()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inkly.db");

        let db = Database::new(path.to_str().unwrap()).expect("should open");
        assert!(path.exists());
        assert_eq!(
            db.path().unwrap().canonicalize().unwrap(),
            path.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inkly.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new(path).unwrap();
            db.set("currentUser", "{\"email\":\"a@b.c\"}").unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(
            db.get("currentUser").unwrap().as_deref(),
            Some("{\"email\":\"a@b.c\"}")
        );
    }

    #[test]
    fn test_set_overwrites_and_remove_deletes() {
        let db = Database::in_memory().unwrap();
        db.set("users", "[]").unwrap();
        db.set("users", "[{}]").unwrap();
        assert_eq!(db.get("users").unwrap().as_deref(), Some("[{}]"));
        assert_eq!(db.keys().unwrap(), vec!["users".to_string()]);

        db.remove("users").unwrap();
        assert!(db.get("users").unwrap().is_none());

        // Removing a missing key is not an error
        db.remove("users").unwrap();
    }

    #[test]
    fn test_clear_removes_everything() {
        let db = Database::in_memory().unwrap();
        db.set("users", "[]").unwrap();
        db.set("a@b.c_dashboard-notes", "[]").unwrap();

        db.clear().unwrap();
        assert!(db.keys().unwrap().is_empty());
        assert!(db.path().is_none());
    }
}
