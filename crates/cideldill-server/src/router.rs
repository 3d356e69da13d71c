use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the full axum router. CORS is wide open on `/api/*`, matching
/// the control plane's intent to be reachable from any origin a debug
/// client happens to run in.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let api = Router::new()
        .route("/breakpoints", get(handlers::breakpoints::list).post(handlers::breakpoints::add))
        .route("/breakpoints/:name", delete(handlers::breakpoints::remove))
        .route("/breakpoints/:name/after_behavior", post(handlers::breakpoints::set_after_behavior))
        .route(
            "/behavior",
            get(handlers::breakpoints::get_default_behavior).post(handlers::breakpoints::set_default_behavior),
        )
        .route("/paused", get(handlers::paused::list))
        .route("/paused/:pause_id/continue", post(handlers::paused::continue_execution))
        .route("/call/start", post(handlers::call::start))
        .route("/call/complete", post(handlers::call::complete))
        .route("/call/event", post(handlers::call::event))
        .route("/call/repl-result", post(handlers::debug_client::repl_result))
        .route("/poll/:pause_id", get(handlers::call::poll))
        .route("/poll-repl/:pause_id", get(handlers::debug_client::poll_repl))
        .route("/cids/query", post(handlers::cids::query))
        .route("/cids/upload", post(handlers::cids::upload))
        .route("/repl/start", post(handlers::repl::start))
        .route("/repl/:session_id/eval", post(handlers::repl::eval))
        .route("/debug-client.js", get(handlers::debug_client::serve));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
