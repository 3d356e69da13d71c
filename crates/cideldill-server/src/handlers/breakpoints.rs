use std::sync::Arc;

use axum::extract::{Json, Path};
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};

use cideldill_types::AfterBehavior;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddBreakpointRequest {
    pub function_name: String,
}

pub async fn list(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "breakpoints": state.breakpoints.list().await }))
}

pub async fn add(Extension(state): Extension<Arc<AppState>>, Json(req): Json<AddBreakpointRequest>) -> Json<Value> {
    state.breakpoints.add_breakpoint(req.function_name).await;
    Json(json!({ "ok": true }))
}

pub async fn remove(Extension(state): Extension<Arc<AppState>>, Path(name): Path<String>) -> Json<Value> {
    state.breakpoints.remove_breakpoint(&name).await;
    Json(json!({ "ok": true }))
}

#[derive(Deserialize)]
pub struct AfterBehaviorRequest {
    pub behavior: String,
}

pub async fn set_after_behavior(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<AfterBehaviorRequest>,
) -> Result<Json<Value>, AppError> {
    let behavior = AfterBehavior::parse(&req.behavior).ok_or_else(|| {
        cideldill_types::CideldillError::BadRequest(format!("unknown behavior {:?}", req.behavior)).into()
    })?;
    state.breakpoints.set_after_behavior(name, behavior).await;
    Ok(Json(json!({ "ok": true })))
}

pub async fn get_default_behavior(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "behavior": state.breakpoints.default_behavior().await.as_wire_str() }))
}

#[derive(Deserialize)]
pub struct SetBehaviorRequest {
    pub behavior: String,
}

pub async fn set_default_behavior(Extension(state): Extension<Arc<AppState>>, Json(req): Json<SetBehaviorRequest>) -> Result<Json<Value>, AppError> {
    let behavior = AfterBehavior::parse(&req.behavior).ok_or_else(|| {
        cideldill_types::CideldillError::BadRequest(format!("unknown behavior {:?}", req.behavior)).into()
    })?;
    state.breakpoints.set_default_behavior(behavior).await;
    Ok(Json(json!({ "ok": true })))
}
