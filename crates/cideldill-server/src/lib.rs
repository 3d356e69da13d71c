//! HTTP control plane: breakpoints, pause coordination, the CID exchange,
//! and the REPL bridge, built the way `sem_os_server` assembles its axum
//! router and handlers — minus authentication, which this substrate's
//! debug-only control plane has no use for.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower::ServiceExt;

    use cideldill_breakpoint::BreakpointManager;
    use cideldill_store::Database;

    use super::*;

    fn test_app() -> axum::Router {
        let db = Arc::new(std::sync::Mutex::new(Database::open_in_memory().unwrap()));
        let breakpoints = Arc::new(BreakpointManager::new(db.clone()));
        let state = Arc::new(AppState::new(breakpoints, db, "http://127.0.0.1:0".to_string()));
        build_router(state)
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = test_app();
        let response = app
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn add_then_list_breakpoints() {
        let app = test_app();
        let add = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/breakpoints")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::json!({"function_name": "widgets.create"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(add.status(), axum::http::StatusCode::OK);

        let list = app
            .oneshot(axum::http::Request::builder().uri("/api/breakpoints").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(list.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["breakpoints"], serde_json::json!(["widgets.create"]));
    }

    #[tokio::test]
    async fn cids_query_reports_missing() {
        let app = test_app();
        let cid = cideldill_codec::compute_cid(b"hi");
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/cids/query")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::json!({"cids": [cid.clone()]}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["missing"], serde_json::json!([cid]));
    }
}
