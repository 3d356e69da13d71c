use rusqlite::params;

use cideldill_types::{CallRecord, CideldillError, Result};

use crate::db::Database;

/// Filters for [`CallLogStore::list`].
#[derive(Debug, Clone, Default)]
pub struct CallLogFilter {
    pub function_name: Option<String>,
    pub process_key: Option<String>,
    pub from_ts: Option<f64>,
    pub to_ts: Option<f64>,
    pub limit: Option<u32>,
}

/// Append-only store of [`CallRecord`]s, backed by the `calls` table.
/// Ordering is by insertion (the `id` autoincrement column), with a
/// timestamp tiebreak only meaningful when callers sort the result
/// themselves — SQLite's `rowid` order already reflects insertion order.
pub struct CallLogStore<'a> {
    db: &'a Database,
}

impl<'a> CallLogStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn record(&self, record: &CallRecord) -> Result<()> {
        let record_json = serde_json::to_string(record).map_err(|e| CideldillError::Internal(e.into()))?;
        self.db
            .conn()
            .execute(
                "INSERT INTO calls (call_id, function_name, timestamp, process_key, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(call_id) DO UPDATE SET record_json = ?5",
                params![record.call_id, record.method_name, record.started_at, record.process_key.to_string(), record_json],
            )
            .map_err(|e| CideldillError::Internal(e.into()))?;
        Ok(())
    }

    pub fn get(&self, call_id: &str) -> Result<Option<CallRecord>> {
        let json: Option<String> = self
            .db
            .conn()
            .query_row("SELECT record_json FROM calls WHERE call_id = ?1", params![call_id], |row| row.get(0))
            .ok();
        json.map(|j| serde_json::from_str(&j).map_err(|e| CideldillError::Internal(e.into()))).transpose()
    }

    pub fn list(&self, filter: &CallLogFilter) -> Result<Vec<CallRecord>> {
        let mut sql = "SELECT record_json FROM calls WHERE 1=1".to_string();
        if filter.function_name.is_some() {
            sql.push_str(" AND function_name = ?");
        }
        if filter.process_key.is_some() {
            sql.push_str(" AND process_key = ?");
        }
        if filter.from_ts.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if filter.to_ts.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql).map_err(|e| CideldillError::Internal(e.into()))?;

        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(name) = &filter.function_name {
            bound.push(Box::new(name.clone()));
        }
        if let Some(pk) = &filter.process_key {
            bound.push(Box::new(pk.clone()));
        }
        if let Some(ts) = filter.from_ts {
            bound.push(Box::new(ts));
        }
        if let Some(ts) = filter.to_ts {
            bound.push(Box::new(ts));
        }
        let params: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let rows = stmt
            .query_map(params.as_slice(), |row| row.get::<_, String>(0))
            .map_err(|e| CideldillError::Internal(e.into()))?;

        let mut records = Vec::new();
        for row in rows {
            let json = row.map_err(|e| CideldillError::Internal(e.into()))?;
            records.push(serde_json::from_str(&json).map_err(|e| CideldillError::Internal(e.into()))?);
        }
        Ok(records)
    }

    pub fn filter_by_function(&self, name: &str) -> Result<Vec<CallRecord>> {
        self.list(&CallLogFilter {
            function_name: Some(name.to_string()),
            ..Default::default()
        })
    }

    /// Submap match over `pretty_args`/`pretty_kwargs`, including nested
    /// objects. There is no practical way to express "submap of
    /// an arbitrary-depth JSON blob" as a SQL predicate against
    /// `record_json` portably, so this scans every record and matches in
    /// Rust — acceptable for an embedded single-file store with no
    /// expectation of millions of rows.
    pub fn search_by_args(&self, partial: &serde_json::Value) -> Result<Vec<CallRecord>> {
        let all = self.list(&CallLogFilter::default())?;
        Ok(all
            .into_iter()
            .filter(|record| is_submap(partial, &record.pretty_args) || is_submap(partial, &record.pretty_kwargs))
            .collect())
    }

    pub fn export_all(&self) -> Result<Vec<CallRecord>> {
        self.list(&CallLogFilter::default())
    }
}

fn is_submap(partial: &serde_json::Value, whole: &serde_json::Value) -> bool {
    match (partial, whole) {
        (serde_json::Value::Object(partial_map), serde_json::Value::Object(whole_map)) => partial_map
            .iter()
            .all(|(k, v)| whole_map.get(k).map(|wv| is_submap(v, wv)).unwrap_or(false)),
        (serde_json::Value::Array(partial_items), serde_json::Value::Array(whole_items)) => {
            partial_items.len() == whole_items.len() && partial_items.iter().zip(whole_items).all(|(p, w)| is_submap(p, w))
        }
        (p, w) => p == w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cideldill_types::{CallSite, CallStatus, ProcessKey};
    use serde_json::json;

    fn sample_record(call_id: &str, method_name: &str, pretty_args: serde_json::Value) -> CallRecord {
        CallRecord {
            call_id: call_id.to_string(),
            method_name: method_name.to_string(),
            status: CallStatus::Success,
            pretty_args,
            pretty_kwargs: json!({}),
            signature: None,
            call_site: CallSite {
                filename: "app.py".to_string(),
                lineno: 10,
                function: "caller".to_string(),
                code_context: None,
                timestamp: 1700000000.0,
                stack_trace: Vec::new(),
            },
            process_pid: 1234,
            process_start_time: 1700000000.0,
            process_key: ProcessKey::new(1700000000.0, 1234),
            page_url: None,
            started_at: 1700000000.0,
            completed_at: None,
            result_cid: None,
            exception: None,
            repl_sessions: Vec::new(),
        }
    }

    #[test]
    fn record_then_get_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let store = CallLogStore::new(&db);
        let record = sample_record("call-1", "widgets.create", json!({"name": "foo"}));
        store.record(&record).unwrap();

        let fetched = store.get("call-1").unwrap().unwrap();
        assert_eq!(fetched.method_name, "widgets.create");
    }

    #[test]
    fn list_preserves_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let store = CallLogStore::new(&db);
        for i in 0..3 {
            store.record(&sample_record(&format!("call-{i}"), "f", json!({}))).unwrap();
        }
        let records = store.list(&CallLogFilter::default()).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.call_id.clone()).collect();
        assert_eq!(ids, vec!["call-0", "call-1", "call-2"]);
    }

    #[test]
    fn filter_by_function_narrows_results() {
        let db = Database::open_in_memory().unwrap();
        let store = CallLogStore::new(&db);
        store.record(&sample_record("a", "widgets.create", json!({}))).unwrap();
        store.record(&sample_record("b", "widgets.delete", json!({}))).unwrap();

        let results = store.filter_by_function("widgets.delete").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].call_id, "b");
    }

    #[test]
    fn search_by_args_matches_nested_submap() {
        let db = Database::open_in_memory().unwrap();
        let store = CallLogStore::new(&db);
        store
            .record(&sample_record("a", "f", json!({"user": {"id": 1, "name": "ada"}, "extra": true})))
            .unwrap();
        store.record(&sample_record("b", "f", json!({"user": {"id": 2}}))).unwrap();

        let results = store.search_by_args(&json!({"user": {"id": 1}})).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].call_id, "a");
    }
}
