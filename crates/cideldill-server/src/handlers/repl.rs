use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Json, Path};
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use cideldill_codec::DecodedValue;
use cideldill_store::CidStore;
use cideldill_types::{CallStartPayload, CideldillError, Payload, Result as CideldillResult, SessionId, TranscriptEntry};

use crate::error::AppError;
use crate::handlers::call::decode_to_json;
use crate::state::{AppState, ClientEvalResult};

#[derive(Deserialize)]
pub struct ReplStartRequest {
    pub pause_id: Uuid,
}

/// Binds the paused call's own arguments into a fresh namespace: keyword
/// arguments by name, then positional arguments against `signature` (a
/// comma-separated parameter name list) if the caller supplied one. This is
/// the only scope available to seed with — there is no live call stack to
/// read further locals from.
fn seed_namespace(db: &std::sync::Mutex<cideldill_store::Database>, call_data: &CallStartPayload) -> CideldillResult<cideldill_repl::Namespace> {
    let mut ns = cideldill_repl::Namespace::new();
    let db = db.lock().expect("db lock poisoned");
    let store = CidStore::new(&db);

    if let Some(signature) = &call_data.signature {
        let names = signature.split(',').map(str::trim).filter(|s| !s.is_empty());
        for (name, payload_ref) in names.zip(call_data.args.iter()) {
            ns.insert(name.to_string(), decode_to_json(&store, &payload_ref.cid)?);
        }
    }

    for (name, payload_ref) in &call_data.kwargs {
        ns.insert(name.clone(), decode_to_json(&store, &payload_ref.cid)?);
    }

    Ok(ns)
}

pub async fn start(Extension(state): Extension<Arc<AppState>>, Json(req): Json<ReplStartRequest>) -> Result<Json<Value>, AppError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    let pid = std::process::id();
    let session_id = state.breakpoints.start_session(req.pause_id, pid, now).await?;

    let paused = state.breakpoints.list_paused().await;
    let namespace = match paused.iter().find(|p| p.pause_id == req.pause_id) {
        Some(p) => seed_namespace(&state.db, &p.call_data)?,
        None => cideldill_repl::Namespace::new(),
    };
    state.repl_namespaces.lock().await.insert(session_id.clone(), namespace);
    Ok(Json(json!({ "session_id": session_id.0 })))
}

#[derive(Deserialize)]
pub struct ReplEvalRequest {
    pub expr: String,
}

/// Turns a client's `call/repl-result` submission into the same
/// `{output, is_error, result_cid}` shape a server-side eval produces.
fn client_eval_outcome(result: ClientEvalResult) -> Result<cideldill_repl::EvalOutcome, AppError> {
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&result.result_data)
        .map_err(|e| CideldillError::BadRequest(e.to_string()))?;
    let cid = cideldill_codec::compute_cid(&bytes);
    let payload = Payload::new(cid.clone(), result.result_serialization_format, bytes);
    let output = match cideldill_codec::decode(&payload)? {
        DecodedValue::Value(v) => cideldill_repl::render_value(&v),
        DecodedValue::Placeholder(p) => serde_json::to_string(&p).unwrap_or_default(),
    };
    Ok(cideldill_repl::EvalOutcome {
        output,
        is_error: false,
        result_cid: Some(cid),
    })
}

pub async fn eval(Extension(state): Extension<Arc<AppState>>, Path(session_id): Path<String>, Json(req): Json<ReplEvalRequest>) -> Result<Json<Value>, AppError> {
    let session_id = SessionId(session_id);
    let session = state
        .breakpoints
        .get_session(&session_id)
        .await
        .ok_or_else(|| CideldillError::SessionNotFound(session_id.to_string()))?;
    if !session.is_open() {
        return Err(CideldillError::SessionNotFound(session_id.to_string()).into());
    }

    let preferred_format = {
        let paused = state.breakpoints.list_paused().await;
        paused
            .iter()
            .find(|p| p.pause_id == session.pause_id)
            .map(|p| p.preferred_format)
            .unwrap_or(cideldill_types::Format::Json)
    };

    // Give a live client-hosted frame (a debuggee's proxy engine, which polls
    // poll-repl while paused) first shot at answering, since it may have
    // richer locals than the args/kwargs namespace seeded above. No client
    // polling this pause just means the timeout elapses and we answer
    // ourselves from that namespace.
    let outcome = match state.submit_client_eval(session.pause_id, req.expr.clone(), crate::state::DEFAULT_CLIENT_EVAL_TIMEOUT).await {
        Some(result) => client_eval_outcome(result)?,
        None => {
            let mut namespaces = state.repl_namespaces.lock().await;
            let ns = namespaces.entry(session_id.clone()).or_default();
            cideldill_repl::eval(ns, &req.expr, preferred_format)
        }
    };

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    let index = session.transcript.len() as u32;
    state
        .breakpoints
        .append_transcript(
            &session_id,
            TranscriptEntry {
                index,
                input: req.expr,
                output: outcome.output.clone(),
                error: if outcome.is_error { Some(outcome.output.clone()) } else { None },
                is_error: outcome.is_error,
                result_cid: outcome.result_cid.clone(),
                created_at: now,
            },
        )
        .await?;

    Ok(Json(json!({ "output": outcome.output, "is_error": outcome.is_error })))
}
