use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `"<pid>-<epoch_6dp>"` — a REPL session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(pid: u32, epoch_secs: f64) -> Self {
        Self(format!("{}-{:.6}", pid, epoch_secs))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub index: u32,
    pub input: String,
    pub output: String,
    pub error: Option<String>,
    pub is_error: bool,
    pub result_cid: Option<String>,
    pub created_at: f64,
}

/// Server-tracked expression evaluator bound to one paused execution,
/// auto-closed when that pause resumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplSession {
    pub session_id: SessionId,
    pub pause_id: Uuid,
    pub pid: u32,
    pub started_at: f64,
    pub closed_at: Option<f64>,
    pub transcript: Vec<TranscriptEntry>,
}

impl ReplSession {
    pub fn new(session_id: SessionId, pause_id: Uuid, pid: u32, started_at: f64) -> Self {
        Self {
            session_id,
            pause_id,
            pid,
            started_at,
            closed_at: None,
            transcript: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
