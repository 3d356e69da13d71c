use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Json, Path};
use axum::Extension;
use serde_json::{json, Value};
use uuid::Uuid;

use cideldill_types::{CideldillError, ResumeAction};

use crate::error::AppError;
use crate::state::AppState;

pub async fn list(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "paused": state.breakpoints.list_paused().await }))
}

pub async fn continue_execution(
    Extension(state): Extension<Arc<AppState>>,
    Path(pause_id): Path<Uuid>,
    Json(action): Json<ResumeAction>,
) -> Result<Json<Value>, AppError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    match state.breakpoints.resume(pause_id, action, now).await {
        Ok(()) => Ok(Json(json!({ "ok": true }))),
        // Resuming an unknown pause is treated as already-continued rather
        // than surfaced as an error.
        Err(CideldillError::PauseNotFound(_)) => Ok(Json(json!({ "ok": true }))),
        Err(e) => Err(e.into()),
    }
}
