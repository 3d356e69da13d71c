//! Maps [`CideldillError`] to HTTP status codes and JSON error bodies,
//! the way `sem_os_server::error::AppError` wraps `SemOsError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use cideldill_types::CideldillError;

pub struct AppError(CideldillError);

impl From<CideldillError> for AppError {
    fn from(e: CideldillError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = json!({ "error": self.0.kind() });

        if let CideldillError::CidMismatch { provided, expected } = &self.0 {
            body["provided_cid"] = json!(provided);
            body["expected_cid"] = json!(expected);
        }
        if let CideldillError::CidNotFound(missing) = &self.0 {
            body["missing_cids"] = json!(missing);
        }

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error handling request");
        }

        (status, Json(body)).into_response()
    }
}
