use thiserror::Error;

/// Wire error kinds from the control-plane contract.
///
/// Each variant owns the message that goes in the `error` JSON body's
/// human-readable fields; `kind()` gives the stable `error` string and
/// `http_status()` the status code a transport layer should use.
#[derive(Debug, Error)]
pub enum CideldillError {
    #[error("cid mismatch: provided {provided} expected {expected}")]
    CidMismatch { provided: String, expected: String },

    #[error("cid not found: {0:?}")]
    CidNotFound(Vec<String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("pause not found: {0}")]
    PauseNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CideldillError {
    /// The stable `error` field clients match on (§7).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CidMismatch { .. } => "cid_mismatch",
            Self::CidNotFound(_) => "cid_not_found",
            Self::BadRequest(_) => "bad_request",
            Self::PauseNotFound(_) => "pause_not_found",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Internal(_) => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::CidMismatch { .. } => 400,
            Self::CidNotFound(_) => 400,
            Self::BadRequest(_) => 400,
            // pause_not_found is handled as implicit "continue" by callers
            // that can do so (§7); when surfaced raw it is a 404.
            Self::PauseNotFound(_) => 404,
            Self::SessionNotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, CideldillError>;
