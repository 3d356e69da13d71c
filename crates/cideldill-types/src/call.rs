use serde::{Deserialize, Serialize};

/// A single stack frame, as captured by the client at the call boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub filename: String,
    pub lineno: u32,
    pub function: String,
    pub code_context: Option<String>,
}

/// Where and when a call happened, plus the N outer frames the client
/// chose to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub filename: String,
    pub lineno: u32,
    pub function: String,
    pub code_context: Option<String>,
    pub timestamp: f64,
    pub stack_trace: Vec<Frame>,
}

/// `"<start_time_seconds_6dp>+<pid>"` — uniquely identifies one host
/// process across time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessKey(pub String);

impl ProcessKey {
    pub fn new(start_time_secs: f64, pid: u32) -> Self {
        Self(format!("{:.6}+{}", start_time_secs, pid))
    }
}

impl std::fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Exception,
    Skipped,
    Replaced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub type_fqn: String,
    pub message: String,
    pub traceback: Option<String>,
}

/// A completed call, as persisted by the Call Log Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub method_name: String,
    pub status: CallStatus,
    pub pretty_args: serde_json::Value,
    pub pretty_kwargs: serde_json::Value,
    pub signature: Option<String>,
    pub call_site: CallSite,
    pub process_pid: u32,
    pub process_start_time: f64,
    pub process_key: ProcessKey,
    pub page_url: Option<String>,
    pub started_at: f64,
    pub completed_at: Option<f64>,
    pub result_cid: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub repl_sessions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_key_pads_to_six_decimals() {
        let key = ProcessKey::new(1_700_000_000.1, 4242);
        assert_eq!(key.0, "1700000000.100000+4242");
    }

    #[test]
    fn process_key_is_stable_for_same_inputs() {
        assert_eq!(ProcessKey::new(1.0, 1), ProcessKey::new(1.0, 1));
    }
}
