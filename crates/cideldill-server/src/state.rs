use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex as AsyncMutex};
use uuid::Uuid;

use cideldill_breakpoint::BreakpointManager;
use cideldill_repl::Namespace;
use cideldill_store::Database;
use cideldill_types::{ActionPayload, SessionId};

/// `{eval_id, expr}` parked for a client-hosted frame to pick up via
/// `poll-repl/<pause_id>`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PendingClientEval {
    pub eval_id: Uuid,
    pub expr: String,
}

struct ClientEvalWaiter {
    sender: oneshot::Sender<ClientEvalResult>,
}

#[derive(Debug, Clone)]
pub struct ClientEvalResult {
    pub result_data: String,
    pub result_serialization_format: cideldill_types::Format,
}

#[derive(Default)]
struct ClientEvalState {
    pending_by_pause: HashMap<Uuid, VecDeque<PendingClientEval>>,
    waiters: HashMap<Uuid, ClientEvalWaiter>,
}

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(25_000);
pub const DEFAULT_CLIENT_EVAL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AppState {
    pub breakpoints: Arc<BreakpointManager>,
    pub db: Arc<std::sync::Mutex<Database>>,
    pub repl_namespaces: AsyncMutex<HashMap<SessionId, Namespace>>,
    pub pending_calls: AsyncMutex<HashMap<String, crate::handlers::call::PendingCall>>,
    pub base_url: std::sync::RwLock<String>,
    next_call_id: AtomicU64,
    client_eval: AsyncMutex<ClientEvalState>,
}

impl AppState {
    pub fn new(breakpoints: Arc<BreakpointManager>, db: Arc<std::sync::Mutex<Database>>, base_url: String) -> Self {
        Self {
            breakpoints,
            db,
            repl_namespaces: AsyncMutex::new(HashMap::new()),
            pending_calls: AsyncMutex::new(HashMap::new()),
            base_url: std::sync::RwLock::new(base_url),
            next_call_id: AtomicU64::new(1),
            client_eval: AsyncMutex::new(ClientEvalState::default()),
        }
    }

    pub fn next_call_id(&self) -> u64 {
        self.next_call_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Parks `{eval_id, expr}` for `pause_id` and blocks until a matching
    /// `call/repl-result` arrives or `timeout` elapses.
    pub async fn submit_client_eval(&self, pause_id: Uuid, expr: String, timeout: Duration) -> Option<ClientEvalResult> {
        let eval_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.client_eval.lock().await;
            state.pending_by_pause.entry(pause_id).or_default().push_back(PendingClientEval { eval_id, expr });
            state.waiters.insert(eval_id, ClientEvalWaiter { sender: tx });
        }
        tokio::time::timeout(timeout, rx).await.ok()?.ok()
    }

    pub async fn pop_pending_client_evals(&self, pause_id: Uuid) -> Vec<PendingClientEval> {
        let mut state = self.client_eval.lock().await;
        state.pending_by_pause.remove(&pause_id).map(Vec::from).unwrap_or_default()
    }

    pub async fn resolve_client_eval(&self, eval_id: Uuid, result: ClientEvalResult) -> bool {
        let mut state = self.client_eval.lock().await;
        if let Some(waiter) = state.waiters.remove(&eval_id) {
            let _ = waiter.sender.send(result);
            true
        } else {
            false
        }
    }
}

impl ClientEvalResult {
    pub fn into_action_payload(self, cid: String) -> ActionPayload {
        ActionPayload {
            cid,
            data: self.result_data,
            serialization_format: self.result_serialization_format,
        }
    }
}
