//! Talks to the control plane over HTTP, the way `sem_os_client::http`
//! talks to `sem_os_server` — one method per endpoint, JSON in and out,
//! errors mapped from the response body.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cideldill_types::{CallSite, CallStartPayload, CallStatus, ExceptionInfo, ResumeAction};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Clone)]
pub struct ControlPlaneClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct CallStartResponse {
    pub call_id: String,
    pub action: String,
    pub poll_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CallCompleteRequest<'a> {
    pub call_id: &'a str,
    pub status: CallStatus,
    pub result_cid: Option<&'a str>,
    pub result_data: Option<&'a str>,
    pub exception: Option<&'a ExceptionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResponse {
    Pending,
    Ready { action: ResumeAction },
}

#[derive(Debug, Deserialize)]
pub struct PendingClientEval {
    pub eval_id: Uuid,
    pub expr: String,
}

#[derive(Debug, Deserialize)]
struct PollReplResponse {
    pending: Vec<PendingClientEval>,
}

#[derive(Debug, Deserialize)]
struct CidsQueryResponse {
    missing: Vec<String>,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: reqwest::Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn error_for_status(resp: reqwest::Response) -> anyhow::Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::anyhow!("control plane returned {status}: {body}")
    }

    pub async fn call_start(&self, payload: &CallStartPayload) -> Result<CallStartResponse> {
        let resp = self.http.post(self.url("/api/call/start")).json(payload).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn call_complete(&self, req: &CallCompleteRequest<'_>) -> Result<()> {
        let resp = self.http.post(self.url("/api/call/complete")).json(req).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(())
    }

    pub async fn call_event(&self, event: &str, method_name: Option<&str>, type_name: Option<&str>, pickle_error: Option<&str>) -> Result<()> {
        let body = serde_json::json!({
            "event": event,
            "method_name": method_name,
            "type_name": type_name,
            "pickle_error": pickle_error,
        });
        let resp = self.http.post(self.url("/api/call/event")).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(())
    }

    pub async fn poll(&self, poll_url: &str) -> Result<PollResponse> {
        let resp = self.http.get(self.url(poll_url)).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn poll_repl(&self, pause_id: Uuid) -> Result<Vec<PendingClientEval>> {
        let resp = self.http.get(self.url(&format!("/api/poll-repl/{pause_id}"))).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(resp.json::<PollReplResponse>().await?.pending)
    }

    pub async fn repl_result(&self, eval_id: Uuid, pause_id: Uuid, result_data: &str, result_serialization_format: cideldill_types::Format) -> Result<()> {
        let body = serde_json::json!({
            "eval_id": eval_id,
            "pause_id": pause_id,
            "result_data": result_data,
            "result_serialization_format": result_serialization_format,
        });
        let resp = self.http.post(self.url("/api/call/repl-result")).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(())
    }

    pub async fn cids_query(&self, cids: &[String]) -> Result<Vec<String>> {
        let resp = self.http.post(self.url("/api/cids/query")).json(&serde_json::json!({ "cids": cids })).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(resp.json::<CidsQueryResponse>().await?.missing)
    }

    pub async fn cids_upload(&self, blobs: &HashMap<String, String>) -> Result<()> {
        let resp = self.http.post(self.url("/api/cids/upload")).json(blobs).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }
        Ok(())
    }
}

/// Snapshots a [`CallSite`] at the point of call. Rust has no per-frame
/// locals/stack introspection at runtime, so unlike the host this wire
/// format was designed for, `stack_trace` is always empty here — callers
/// that want outer frames populate them explicitly via `with_stack_trace`.
pub fn call_site(function: impl Into<String>, filename: impl Into<String>, lineno: u32, started_at: f64) -> CallSite {
    CallSite { filename: filename.into(), lineno, function: function.into(), code_context: None, timestamp: started_at, stack_trace: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let client = ControlPlaneClient::new("http://localhost:4000/");
        assert_eq!(client.url("/api/call/start"), "http://localhost:4000/api/call/start");
    }
}
