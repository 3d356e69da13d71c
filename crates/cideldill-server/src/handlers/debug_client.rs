use std::sync::Arc;

use axum::extract::Json;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use cideldill_types::{CideldillError, Format};

use crate::error::AppError;
use crate::state::{AppState, ClientEvalResult};

const JS_CLIENT_TEMPLATE: &str = include_str!("../debug_client.js.tmpl");

/// `GET /api/debug-client.js` — serves the ES module with the server's own
/// base URL substituted in.
pub async fn serve(Extension(state): Extension<Arc<AppState>>) -> Response {
    let base_url = state.base_url.read().expect("base_url lock poisoned").clone();
    let body = JS_CLIENT_TEMPLATE.replace("__CIDELDILL_SERVER_URL__", &base_url);
    ([(header::CONTENT_TYPE, "application/javascript")], body).into_response()
}

pub async fn poll_repl(Extension(state): Extension<Arc<AppState>>, axum::extract::Path(pause_id): axum::extract::Path<Uuid>) -> Json<Value> {
    let pending = state.pop_pending_client_evals(pause_id).await;
    Json(json!({ "pending": pending }))
}

#[derive(Deserialize)]
pub struct ReplResultRequest {
    pub eval_id: Uuid,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub pause_id: Option<Uuid>,
    pub result_data: String,
    pub result_serialization_format: Format,
}

pub async fn repl_result(Extension(state): Extension<Arc<AppState>>, Json(req): Json<ReplResultRequest>) -> Result<Json<Value>, AppError> {
    let resolved = state
        .resolve_client_eval(
            req.eval_id,
            ClientEvalResult {
                result_data: req.result_data,
                result_serialization_format: req.result_serialization_format,
            },
        )
        .await;

    if resolved {
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(CideldillError::BadRequest(format!("unknown eval_id {:?}", req.eval_id)).into())
    }
}
