//! Embedded relational storage: the CID Store (content-addressed blobs)
//! and the Call Log Store (append-only `CallRecord`s), both backed by a
//! single rusqlite connection, the way `agtrace-index` keeps one lightweight
//! SQLite file as its metadata index instead of a server-based database.

pub mod call_log;
pub mod cid_store;
pub mod db;

pub use call_log::{CallLogFilter, CallLogStore};
pub use cid_store::{CidStore, CidStoreStats};
pub use db::{default_db_path, DbLocation, Database};
