use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, Notify};
use uuid::Uuid;

use cideldill_store::{CallLogFilter, CallLogStore, CidStore, Database};
use cideldill_types::{
    AfterBehavior, CallRecord, CallStartPayload, CideldillError, Event, Format, PausedExecution, ReplSession, Result, SessionId, TranscriptEntry,
};

/// A callback invoked for every dispatched [`Event`]. An observer that
/// panics or otherwise fails is isolated — see [`BreakpointManager::dispatch`].
pub type Observer = Arc<dyn Fn(Event) + Send + Sync>;

struct PauseWaiter {
    notify: Arc<Notify>,
}

#[derive(Default)]
struct State {
    breakpoints: HashSet<String>,
    default_behavior: Option<AfterBehavior>,
    after_behavior_overrides: HashMap<String, AfterBehavior>,
    paused: HashMap<Uuid, PausedExecution>,
    resume_actions: HashMap<Uuid, cideldill_types::ResumeAction>,
    waiters: HashMap<Uuid, PauseWaiter>,
    repl_sessions: HashMap<SessionId, ReplSession>,
    registered_functions: HashMap<String, Option<String>>,
}

/// Thread-safe authority on debug state. Guards its own state behind a
/// single async mutex; observer fan-out and storage writes happen outside
/// that lock so observers can call back into the manager without
/// deadlocking.
pub struct BreakpointManager {
    state: AsyncMutex<State>,
    observers: std::sync::Mutex<Vec<Observer>>,
    db: Arc<std::sync::Mutex<Database>>,
}

impl BreakpointManager {
    pub fn new(db: Arc<std::sync::Mutex<Database>>) -> Self {
        Self {
            state: AsyncMutex::new(State {
                default_behavior: Some(AfterBehavior::Stop),
                ..Default::default()
            }),
            observers: std::sync::Mutex::new(Vec::new()),
            db,
        }
    }

    pub fn subscribe(&self, observer: Observer) {
        self.observers.lock().expect("observers lock poisoned").push(observer);
    }

    fn dispatch(&self, event: Event) {
        let observers = self.observers.lock().expect("observers lock poisoned").clone();
        for observer in observers {
            let event = event.clone();
            // Catching unwind keeps one misbehaving observer from taking
            // down the caller or the rest of the fan-out.
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| observer(event))) {
                tracing::error!(?panic, "observer panicked handling event");
            }
        }
    }

    pub async fn add_breakpoint(&self, function_name: impl Into<String>) {
        self.state.lock().await.breakpoints.insert(function_name.into());
    }

    pub async fn remove_breakpoint(&self, function_name: &str) {
        self.state.lock().await.breakpoints.remove(function_name);
    }

    pub async fn clear(&self) {
        self.state.lock().await.breakpoints.clear();
    }

    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().await.breakpoints.iter().cloned().collect();
        names.sort();
        names
    }

    pub async fn register_function(&self, name: impl Into<String>, signature: Option<String>) {
        self.state.lock().await.registered_functions.insert(name.into(), signature);
    }

    pub async fn set_default_behavior(&self, behavior: AfterBehavior) {
        self.state.lock().await.default_behavior = Some(behavior);
    }

    pub async fn set_after_behavior(&self, function_name: impl Into<String>, behavior: AfterBehavior) {
        self.state.lock().await.after_behavior_overrides.insert(function_name.into(), behavior);
    }

    pub async fn default_behavior(&self) -> AfterBehavior {
        self.state.lock().await.default_behavior.unwrap_or(AfterBehavior::Stop)
    }

    /// `true` iff `function_name` has a breakpoint AND the effective
    /// behavior for that name is `Stop`.
    pub async fn should_pause(&self, function_name: &str) -> bool {
        let state = self.state.lock().await;
        if !state.breakpoints.contains(function_name) {
            return false;
        }
        let effective = state
            .after_behavior_overrides
            .get(function_name)
            .copied()
            .or(state.default_behavior)
            .unwrap_or(AfterBehavior::Stop);
        effective == AfterBehavior::Stop
    }

    /// Parks `call_data` as a new [`PausedExecution`], returning its
    /// `pause_id`.
    pub async fn add_paused(&self, call_data: CallStartPayload, preferred_format: Format, paused_at: f64) -> Uuid {
        let pause_id = Uuid::new_v4();
        let paused = PausedExecution {
            pause_id,
            call_data,
            paused_at,
            preferred_format,
        };

        {
            let mut state = self.state.lock().await;
            state.waiters.insert(pause_id, PauseWaiter { notify: Arc::new(Notify::new()) });
            state.paused.insert(pause_id, paused.clone());
        }

        self.dispatch(Event::ExecutionPaused(Box::new(paused)));
        pause_id
    }

    pub async fn list_paused(&self) -> Vec<PausedExecution> {
        self.state.lock().await.paused.values().cloned().collect()
    }

    /// Resolves a pause with `action`: stores the action, removes the pause
    /// from the paused set, auto-closes its open REPL sessions, wakes any
    /// blocked waiter, and dispatches `execution_resumed`.
    pub async fn resume(&self, pause_id: Uuid, action: cideldill_types::ResumeAction, resumed_at: f64) -> Result<()> {
        let notify = {
            let mut state = self.state.lock().await;
            if state.paused.remove(&pause_id).is_none() && !state.resume_actions.contains_key(&pause_id) {
                return Err(CideldillError::PauseNotFound(pause_id.to_string()));
            }
            state.resume_actions.insert(pause_id, action);

            for session in state.repl_sessions.values_mut() {
                if session.pause_id == pause_id && session.is_open() {
                    session.closed_at = Some(resumed_at);
                }
            }

            state.waiters.get(&pause_id).map(|w| w.notify.clone())
        };

        if let Some(notify) = notify {
            notify.notify_waiters();
        }

        self.dispatch(Event::ExecutionResumed { pause_id });
        Ok(())
    }

    pub async fn pop_resume_action(&self, pause_id: Uuid) -> Option<cideldill_types::ResumeAction> {
        let mut state = self.state.lock().await;
        let action = state.resume_actions.remove(&pause_id);
        state.waiters.remove(&pause_id);
        action
    }

    /// Blocks (cooperatively) until a resume action exists for `pause_id`
    /// or `timeout` elapses, whichever comes first. A timeout with no
    /// action is treated by callers as an implicit continue.
    pub async fn wait_for_resume(&self, pause_id: Uuid, timeout: Duration) -> Option<cideldill_types::ResumeAction> {
        if let Some(action) = self.pop_resume_action(pause_id).await {
            return Some(action);
        }

        let notify = {
            let state = self.state.lock().await;
            state.waiters.get(&pause_id).map(|w| w.notify.clone())
        }?;

        let _ = tokio::time::timeout(timeout, notify.notified()).await;
        self.pop_resume_action(pause_id).await
    }

    /// Appends `record` to the Call Log Store and dispatches
    /// `call_completed`.
    pub fn record_call(&self, record: CallRecord) -> Result<()> {
        {
            let db = self.db.lock().expect("db lock poisoned");
            CallLogStore::new(&db).record(&record)?;
        }
        self.dispatch(Event::CallCompleted(Box::new(record)));
        Ok(())
    }

    pub fn list_calls(&self, filter: &CallLogFilter) -> Result<Vec<CallRecord>> {
        let db = self.db.lock().expect("db lock poisoned");
        CallLogStore::new(&db).list(filter)
    }

    pub fn cid_store(&self) -> &std::sync::Mutex<Database> {
        &self.db
    }

    pub async fn start_session(&self, pause_id: Uuid, pid: u32, started_at: f64) -> Result<SessionId> {
        let mut state = self.state.lock().await;
        if !state.paused.contains_key(&pause_id) {
            return Err(CideldillError::PauseNotFound(pause_id.to_string()));
        }
        let session_id = SessionId::new(pid, started_at);
        state.repl_sessions.insert(session_id.clone(), ReplSession::new(session_id.clone(), pause_id, pid, started_at));
        Ok(session_id)
    }

    pub async fn append_transcript(&self, session_id: &SessionId, entry: TranscriptEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        let session = state
            .repl_sessions
            .get_mut(session_id)
            .ok_or_else(|| CideldillError::SessionNotFound(session_id.to_string()))?;
        session.transcript.push(entry);
        Ok(())
    }

    pub async fn close_session(&self, session_id: &SessionId, closed_at: f64) -> Result<()> {
        let mut state = self.state.lock().await;
        let session = state
            .repl_sessions
            .get_mut(session_id)
            .ok_or_else(|| CideldillError::SessionNotFound(session_id.to_string()))?;
        session.closed_at = Some(closed_at);
        Ok(())
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Option<ReplSession> {
        self.state.lock().await.repl_sessions.get(session_id).cloned()
    }

    pub async fn list_sessions(&self, open_only: bool) -> Vec<ReplSession> {
        self.state
            .lock()
            .await
            .repl_sessions
            .values()
            .filter(|s| !open_only || s.is_open())
            .cloned()
            .collect()
    }
}

pub fn cid_store_for<'a>(db: &'a Database) -> CidStore<'a> {
    CidStore::new(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cideldill_types::{CallSite, ProcessKey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> BreakpointManager {
        BreakpointManager::new(Arc::new(std::sync::Mutex::new(Database::open_in_memory().unwrap())))
    }

    fn sample_call_start() -> CallStartPayload {
        CallStartPayload {
            method_name: "widgets.create".to_string(),
            target: cideldill_types::PayloadRef { cid: "t".into(), data: None },
            args: Vec::new(),
            kwargs: Default::default(),
            call_site: CallSite {
                filename: "app.py".into(),
                lineno: 1,
                function: "caller".into(),
                code_context: None,
                timestamp: 0.0,
                stack_trace: Vec::new(),
            },
            process_pid: 1,
            process_start_time: 0.0,
            page_url: None,
            preferred_format: Format::Json,
            signature: None,
        }
    }

    #[tokio::test]
    async fn should_pause_requires_breakpoint_and_stop_behavior() {
        let mgr = manager();
        assert!(!mgr.should_pause("f").await);

        mgr.add_breakpoint("f").await;
        assert!(mgr.should_pause("f").await);

        mgr.set_default_behavior(AfterBehavior::Go).await;
        assert!(!mgr.should_pause("f").await);

        mgr.set_after_behavior("f", AfterBehavior::Stop).await;
        assert!(mgr.should_pause("f").await);
    }

    #[tokio::test]
    async fn resume_then_wait_for_resume_returns_immediately() {
        let mgr = manager();
        let pause_id = mgr.add_paused(sample_call_start(), Format::Json, 0.0).await;
        mgr.resume(pause_id, cideldill_types::ResumeAction::Continue, 1.0).await.unwrap();

        let action = mgr.wait_for_resume(pause_id, Duration::from_millis(50)).await;
        assert!(matches!(action, Some(cideldill_types::ResumeAction::Continue)));
    }

    #[tokio::test]
    async fn wait_for_resume_times_out_to_none() {
        let mgr = manager();
        let pause_id = mgr.add_paused(sample_call_start(), Format::Json, 0.0).await;
        let action = mgr.wait_for_resume(pause_id, Duration::from_millis(20)).await;
        assert!(action.is_none());
    }

    #[tokio::test]
    async fn resuming_closes_open_repl_sessions_for_that_pause() {
        let mgr = manager();
        let pause_id = mgr.add_paused(sample_call_start(), Format::Json, 0.0).await;
        let session_id = mgr.start_session(pause_id, 1, 0.0).await.unwrap();

        mgr.resume(pause_id, cideldill_types::ResumeAction::Continue, 1.0).await.unwrap();

        let session = mgr.get_session(&session_id).await.unwrap();
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn observer_panic_does_not_stop_other_observers() {
        let mgr = manager();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        mgr.subscribe(Arc::new(|_event| panic!("boom")));
        mgr.subscribe(Arc::new(move |_event| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        mgr.add_paused(sample_call_start(), Format::Json, 0.0).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn record_call_persists_and_dispatches() {
        let mgr = manager();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        mgr.subscribe(Arc::new(move |event| {
            if matches!(event, Event::CallCompleted(_)) {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let record = CallRecord {
            call_id: "call-1".into(),
            method_name: "f".into(),
            status: cideldill_types::CallStatus::Success,
            pretty_args: serde_json::json!({}),
            pretty_kwargs: serde_json::json!({}),
            signature: None,
            call_site: CallSite {
                filename: "a.py".into(),
                lineno: 1,
                function: "caller".into(),
                code_context: None,
                timestamp: 0.0,
                stack_trace: Vec::new(),
            },
            process_pid: 1,
            process_start_time: 0.0,
            process_key: ProcessKey::new(0.0, 1),
            page_url: None,
            started_at: 0.0,
            completed_at: Some(1.0),
            result_cid: None,
            exception: None,
            repl_sessions: Vec::new(),
        };

        mgr.record_call(record).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.list_calls(&CallLogFilter::default()).unwrap().len(), 1);
    }
}
