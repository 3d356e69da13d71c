use std::collections::HashMap;

use rusqlite::params;

use cideldill_codec::compute_cid;
use cideldill_types::{CideldillError, Result};

use crate::db::Database;

/// `count` and `total_size_bytes` over every stored blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CidStoreStats {
    pub count: u64,
    pub total_size_bytes: u64,
}

/// CID → bytes mapping backed by the `blobs` table. Writes are idempotent:
/// re-`put`ting an already-stored CID is a no-op, not an error.
pub struct CidStore<'a> {
    db: &'a Database,
}

impl<'a> CidStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Verifies every `(cid, bytes)` pair before writing anything. Any
    /// mismatch fails the whole batch: no partial writes. Reports
    /// the first offending pair found; callers that need the full offending
    /// set should pre-validate with [`cideldill_codec::verify`] themselves.
    pub fn put_many(&self, entries: &HashMap<String, Vec<u8>>) -> Result<()> {
        for (cid, bytes) in entries {
            if !cideldill_codec::verify(bytes, cid) {
                return Err(CideldillError::CidMismatch {
                    provided: cid.clone(),
                    expected: compute_cid(bytes),
                });
            }
        }

        let conn = self.db.conn();
        for (cid, bytes) in entries {
            conn.execute(
                "INSERT INTO blobs (cid, bytes) VALUES (?1, ?2) ON CONFLICT(cid) DO NOTHING",
                params![cid, bytes],
            )
            .map_err(|e| CideldillError::Internal(e.into()))?;
        }
        Ok(())
    }

    pub fn get_many(&self, cids: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let conn = self.db.conn();
        let mut found = HashMap::new();
        for cid in cids {
            let bytes: Option<Vec<u8>> = conn
                .query_row("SELECT bytes FROM blobs WHERE cid = ?1", params![cid], |row| row.get(0))
                .optional_result()?;
            if let Some(bytes) = bytes {
                found.insert(cid.clone(), bytes);
            }
        }
        Ok(found)
    }

    pub fn missing(&self, cids: &[String]) -> Result<Vec<String>> {
        let present = self.get_many(cids)?;
        Ok(cids.iter().filter(|cid| !present.contains_key(*cid)).cloned().collect())
    }

    pub fn stats(&self) -> Result<CidStoreStats> {
        let conn = self.db.conn();
        let (count, total_size_bytes): (i64, Option<i64>) = conn
            .query_row("SELECT COUNT(*), SUM(LENGTH(bytes)) FROM blobs", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| CideldillError::Internal(e.into()))?;
        Ok(CidStoreStats {
            count: count as u64,
            total_size_bytes: total_size_bytes.unwrap_or(0) as u64,
        })
    }
}

trait OptionalResultExt<T> {
    fn optional_result(self) -> Result<Option<T>>;
}

impl<T> OptionalResultExt<T> for rusqlite::Result<T> {
    fn optional_result(self) -> Result<Option<T>> {
        use rusqlite::Error::QueryReturnedNoRows;
        match self {
            Ok(v) => Ok(Some(v)),
            Err(QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CideldillError::Internal(e.into())),
        }
    }
}
