use std::path::{Path, PathBuf};

use rusqlite::Connection;

use cideldill_types::{CideldillError, Result};

/// Where a server's persisted state lives.
pub enum DbLocation {
    Memory,
    Path(PathBuf),
}

/// Wraps the single [`rusqlite::Connection`] shared by the CID store and
/// call log store. Both tables live in the same file so a server's entire
/// state is one portable `.sqlite3` (or none, for `:memory:`).
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(location: DbLocation) -> Result<Self> {
        let conn = match location {
            DbLocation::Memory => Connection::open_in_memory(),
            DbLocation::Path(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| CideldillError::Internal(e.into()))?;
                }
                Connection::open(&path)
            }
        }
        .map_err(|e| CideldillError::Internal(e.into()))?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(DbLocation::Memory)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS blobs (
                    cid TEXT PRIMARY KEY,
                    bytes BLOB NOT NULL
                );

                CREATE TABLE IF NOT EXISTS calls (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    call_id TEXT NOT NULL UNIQUE,
                    function_name TEXT NOT NULL,
                    timestamp REAL NOT NULL,
                    process_key TEXT NOT NULL,
                    record_json TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_calls_function ON calls(function_name);
                CREATE INDEX IF NOT EXISTS idx_calls_process_key ON calls(process_key);
                CREATE INDEX IF NOT EXISTS idx_calls_timestamp ON calls(timestamp);
                "#,
            )
            .map_err(|e| CideldillError::Internal(e.into()))?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Resolves the default on-disk path for a fresh server DB: a timestamped
/// file under `<home>/.cideldill/breakpoint_dbs/`. `home` is injected so
/// callers can point this at a tempdir in tests.
pub fn default_db_path(home: &Path, unix_timestamp_secs: f64) -> PathBuf {
    home.join(".cideldill")
        .join("breakpoint_dbs")
        .join(format!("breakpoints-{:.6}.sqlite3", unix_timestamp_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_initializes_schema_without_touching_disk() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db.conn().query_row("SELECT COUNT(*) FROM blobs", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn default_db_path_is_timestamped_and_namespaced() {
        let path = default_db_path(Path::new("/home/alice"), 1700000000.5);
        assert_eq!(path, PathBuf::from("/home/alice/.cideldill/breakpoint_dbs/breakpoints-1700000000.500000.sqlite3"));
    }
}
