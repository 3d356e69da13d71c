use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use cideldill_store::CidStore;
use cideldill_types::CideldillError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CidsQueryRequest {
    pub cids: Vec<String>,
}

pub async fn query(Extension(state): Extension<Arc<AppState>>, Json(req): Json<CidsQueryRequest>) -> Result<Json<Value>, AppError> {
    let db = state.db.lock().expect("db lock poisoned");
    let missing = CidStore::new(&db).missing(&req.cids)?;
    Ok(Json(json!({ "missing": missing })))
}

/// Request body is the `cid -> base64` map itself, not wrapped in an
/// envelope field.
pub async fn upload(Extension(state): Extension<Arc<AppState>>, Json(req): Json<HashMap<String, String>>) -> Result<Json<Value>, AppError> {
    use base64::Engine as _;
    let mut decoded = HashMap::with_capacity(req.len());
    for (cid, b64) in req {
        let bytes = base64::engine::general_purpose::STANDARD.decode(&b64).map_err(|e| CideldillError::BadRequest(e.to_string()))?;
        decoded.insert(cid, bytes);
    }

    let db = state.db.lock().expect("db lock poisoned");
    CidStore::new(&db).put_many(&decoded)?;
    Ok(Json(json!({ "ok": true })))
}
