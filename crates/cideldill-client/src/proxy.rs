//! Wraps a target with call/start → apply action → execute → call/complete,
//! generalized from `sem_os_client::{HttpClient, InProcessClient}`'s
//! one-method-per-endpoint shape into a single engine that mediates a call
//! to *any* Rust closure instead of one fixed trait surface.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use cideldill_codec::{DecodedValue, Serializable};
use cideldill_types::{ActionPayload, CallSite, CallStatus, ExceptionInfo, Format, Payload, PayloadRef, ResumeAction};

use crate::cid_cache::CidCache;
use crate::deadlock_watchdog::DeadlockWatchdog;
use crate::http::{CallCompleteRequest, ControlPlaneClient, PollResponse};
use crate::registry::FunctionRegistry;

/// Operations a proxy never intercepts. Checked by name; callers extend
/// the default set with `allow_transparent`.
fn default_transparent_methods() -> HashSet<String> {
    ["__repr__", "__eq__", "__hash__", "__identity__"].into_iter().map(String::from).collect()
}

pub struct ProxyEngine {
    http: ControlPlaneClient,
    enabled: AtomicBool,
    cid_cache: CidCache,
    pub registry: FunctionRegistry,
    watchdog: Option<Arc<DeadlockWatchdog>>,
    process_pid: u32,
    process_start_time: f64,
    transparent_methods: Mutex<HashSet<String>>,
    preferred_format: Format,
    poll_interval_override: Option<Duration>,
}

/// What a mediated call produced: either the value the target (or a
/// `replace`/`skip` stand-in) returned, or the exception it raised.
pub enum ProxyOutcome {
    Value(Value),
    Exception(ExceptionInfo),
}

struct EncodedArg {
    payload: Payload,
    json: Value,
}

impl ProxyEngine {
    pub fn new(base_url: impl Into<String>, process_start_time: f64) -> Self {
        Self {
            http: ControlPlaneClient::new(base_url),
            enabled: AtomicBool::new(true),
            cid_cache: CidCache::new(),
            registry: FunctionRegistry::new(),
            watchdog: None,
            process_pid: std::process::id(),
            process_start_time,
            transparent_methods: Mutex::new(default_transparent_methods()),
            preferred_format: Format::Json,
            poll_interval_override: None,
        }
    }

    pub fn with_watchdog(mut self, watchdog: Arc<DeadlockWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn with_preferred_format(mut self, format: Format) -> Self {
        self.preferred_format = format;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_override = Some(interval);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn allow_transparent(&self, method_name: impl Into<String>) {
        self.transparent_methods.lock().expect("transparent methods lock poisoned").insert(method_name.into());
    }

    fn is_transparent(&self, method_name: &str) -> bool {
        self.transparent_methods.lock().expect("transparent methods lock poisoned").contains(method_name)
    }

    fn encode(&self, value: &dyn Serializable) -> EncodedArg {
        let payload = cideldill_codec::serialize(value, self.preferred_format);
        let json = match cideldill_codec::decode(&payload) {
            Ok(DecodedValue::Value(v)) => v,
            Ok(DecodedValue::Placeholder(p)) => serde_json::to_value(p).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        };
        EncodedArg { payload, json }
    }

    fn payload_ref(&self, encoded: &EncodedArg) -> PayloadRef {
        let already_known = self.cid_cache.is_known(&encoded.payload.cid);
        self.cid_cache.mark_known(&encoded.payload.cid);
        if already_known {
            PayloadRef { cid: encoded.payload.cid.clone(), data: None }
        } else {
            use base64::Engine as _;
            PayloadRef { cid: encoded.payload.cid.clone(), data: Some(base64::engine::general_purpose::STANDARD.encode(&encoded.payload.bytes)) }
        }
    }

    /// Mediates one call from an async host. `exec` receives the
    /// call's positional and keyword arguments as plain JSON — already
    /// decoded from whatever the resume action supplied, whether that's the
    /// original arguments (`continue`) or server-supplied replacements
    /// (`modify`) — and is responsible for deserializing them into whatever
    /// concrete types the wrapped closure expects.
    #[allow(clippy::too_many_arguments)]
    pub async fn call_async<F, Fut>(
        &self,
        method_name: &str,
        target: &dyn Serializable,
        args: &[&dyn Serializable],
        kwargs: &BTreeMap<String, &dyn Serializable>,
        call_site: CallSite,
        page_url: Option<String>,
        exec: F,
    ) -> anyhow::Result<ProxyOutcome>
    where
        F: FnOnce(Vec<Value>, HashMap<String, Value>) -> Fut,
        Fut: Future<Output = Result<Value, ExceptionInfo>>,
    {
        let arg_json: Vec<Value> = args.iter().map(|a| a.try_to_json().unwrap_or(Value::Null)).collect();
        let kwarg_json: HashMap<String, Value> = kwargs.iter().map(|(k, v)| (k.clone(), v.try_to_json().unwrap_or(Value::Null))).collect();

        if !self.is_enabled() || self.is_transparent(method_name) {
            return Ok(exec(arg_json, kwarg_json).await.map_or_else(ProxyOutcome::Exception, ProxyOutcome::Value));
        }

        let _tracked = self.watchdog.as_ref().map(|w| w.track(method_name));

        let target_encoded = self.encode(target);
        let arg_encoded: Vec<EncodedArg> = args.iter().map(|a| self.encode(*a)).collect();
        let kwarg_encoded: BTreeMap<String, EncodedArg> = kwargs.iter().map(|(k, v)| (k.clone(), self.encode(*v))).collect();

        let mut blobs_this_call: HashMap<String, Payload> = HashMap::new();
        blobs_this_call.insert(target_encoded.payload.cid.clone(), target_encoded.payload.clone());
        for e in &arg_encoded {
            blobs_this_call.insert(e.payload.cid.clone(), e.payload.clone());
        }
        for e in kwarg_encoded.values() {
            blobs_this_call.insert(e.payload.cid.clone(), e.payload.clone());
        }

        let payload = cideldill_types::CallStartPayload {
            method_name: method_name.to_string(),
            target: self.payload_ref(&target_encoded),
            args: arg_encoded.iter().map(|e| self.payload_ref(e)).collect(),
            kwargs: kwarg_encoded.iter().map(|(k, e)| (k.clone(), self.payload_ref(e))).collect(),
            call_site,
            process_pid: self.process_pid,
            process_start_time: self.process_start_time,
            page_url,
            preferred_format: self.preferred_format,
            signature: None,
        };

        let start = self.call_start_with_retry(payload, &blobs_this_call).await?;

        let action = if start.action == "poll" {
            let poll_url = start.poll_url.clone().ok_or_else(|| anyhow::anyhow!("server said poll but gave no poll_url"))?;
            self.await_resume_action(&poll_url, &kwarg_json).await?
        } else {
            ResumeAction::Continue
        };

        match action {
            ResumeAction::Continue => {
                let outcome = exec(arg_json, kwarg_json).await;
                self.settle(&start.call_id, outcome).await
            }
            ResumeAction::Modify { modified_args, modified_kwargs } => {
                let new_args = modified_args.iter().map(decode_action_payload).collect::<anyhow::Result<Vec<_>>>()?;
                let new_kwargs = modified_kwargs.iter().map(|(k, v)| Ok((k.clone(), decode_action_payload(v)?))).collect::<anyhow::Result<HashMap<_, _>>>()?;
                let outcome = exec(new_args, new_kwargs).await;
                self.settle(&start.call_id, outcome).await
            }
            ResumeAction::Skip { fake_result } => {
                let value = match &fake_result {
                    Some(ap) => decode_action_payload(ap)?,
                    None => Value::Null,
                };
                self.complete(&start.call_id, CallStatus::Skipped, Some(&value), None).await?;
                return Ok(ProxyOutcome::Value(value));
            }
            ResumeAction::Raise { exception_type, exception_message } => {
                let exception = ExceptionInfo { type_fqn: exception_type, message: exception_message, traceback: None };
                self.complete(&start.call_id, CallStatus::Exception, None, Some(&exception)).await?;
                return Ok(ProxyOutcome::Exception(exception));
            }
            ResumeAction::Replace { function_name } => {
                let result = self.registry.call(&function_name, &arg_json, &kwarg_json);
                match result {
                    Ok(value) => {
                        self.complete(&start.call_id, CallStatus::Replaced, Some(&value), None).await?;
                        return Ok(ProxyOutcome::Value(value));
                    }
                    Err(exception) => {
                        self.complete(&start.call_id, CallStatus::Exception, None, Some(&exception)).await?;
                        return Ok(ProxyOutcome::Exception(exception));
                    }
                }
            }
        }
    }

    /// `call_start`, retrying exactly once by uploading any CIDs the server
    /// reports missing. Only retries on `cid_not_found`.
    async fn call_start_with_retry(&self, mut payload: cideldill_types::CallStartPayload, blobs: &HashMap<String, Payload>) -> anyhow::Result<crate::http::CallStartResponse> {
        match self.http.call_start(&payload).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let Some(missing) = extract_missing_cids(&e) else { return Err(e) };
                use base64::Engine as _;
                let mut reupload = HashMap::new();
                for cid in &missing {
                    if let Some(p) = blobs.get(cid) {
                        reupload.insert(cid.clone(), base64::engine::general_purpose::STANDARD.encode(&p.bytes));
                    }
                }
                self.http.cids_upload(&reupload).await?;
                for r in std::iter::once(&mut payload.target).chain(payload.args.iter_mut()).chain(payload.kwargs.values_mut()) {
                    if missing.contains(&r.cid) {
                        if let Some(p) = blobs.get(&r.cid) {
                            use base64::Engine as _;
                            r.data = Some(base64::engine::general_purpose::STANDARD.encode(&p.bytes));
                        }
                    }
                }
                self.http.call_start(&payload).await
            }
        }
    }

    async fn settle(&self, call_id: &str, outcome: Result<Value, ExceptionInfo>) -> anyhow::Result<ProxyOutcome> {
        match outcome {
            Ok(value) => {
                self.complete(call_id, CallStatus::Success, Some(&value), None).await?;
                Ok(ProxyOutcome::Value(value))
            }
            Err(exception) => {
                self.complete(call_id, CallStatus::Exception, None, Some(&exception)).await?;
                Ok(ProxyOutcome::Exception(exception))
            }
        }
    }

    async fn complete(&self, call_id: &str, status: CallStatus, result: Option<&Value>, exception: Option<&ExceptionInfo>) -> anyhow::Result<()> {
        let (result_cid, result_data) = match result {
            Some(value) => {
                let payload = cideldill_codec::serialize(value, self.preferred_format);
                use base64::Engine as _;
                (Some(payload.cid.clone()), Some(base64::engine::general_purpose::STANDARD.encode(&payload.bytes)))
            }
            None => (None, None),
        };
        self.http
            .call_complete(&CallCompleteRequest {
                call_id,
                status,
                result_cid: result_cid.as_deref(),
                result_data: result_data.as_deref(),
                exception,
            })
            .await
    }

    /// Long-polls for a resume action while servicing REPL-eval requests
    /// against a namespace seeded from this call's arguments. Rust has no
    /// dynamic frame locals to seed a namespace from, so the only bindings
    /// available here are the call's own args/kwargs.
    async fn await_resume_action(&self, poll_url: &str, kwarg_json: &HashMap<String, Value>) -> anyhow::Result<ResumeAction> {
        let pause_id = extract_pause_id(poll_url);
        let interval = self.poll_interval_override.unwrap_or(Duration::from_millis(150));

        let repl_task = pause_id.map(|pause_id| {
            let http = self.http.clone();
            // Positional args have no names to bind here; kwargs are the
            // only part of this call's scope a namespace can be seeded with.
            let namespace_seed = kwarg_json.clone();
            tokio::spawn(async move {
                loop {
                    if let Ok(pending) = http.poll_repl(pause_id).await {
                        for eval in pending {
                            let mut ns: cideldill_repl::Namespace = namespace_seed.clone();
                            let outcome = cideldill_repl::eval(&mut ns, &eval.expr, Format::Json);
                            let rendered = cideldill_codec::serialize(&outcome.output, Format::Json);
                            use base64::Engine as _;
                            let result_data = base64::engine::general_purpose::STANDARD.encode(&rendered.bytes);
                            let _ = http.repl_result(eval.eval_id, pause_id, &result_data, Format::Json).await;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
        });

        let result = loop {
            match self.http.poll(poll_url).await? {
                PollResponse::Ready { action } => break action,
                PollResponse::Pending => tokio::time::sleep(interval).await,
            }
        };

        if let Some(task) = repl_task {
            task.abort();
        }
        Ok(result)
    }

    /// Bridges an async mediated call onto a blocking call for synchronous
    /// hosts: blocks the calling thread in a bounded poll loop.
    #[allow(clippy::too_many_arguments)]
    pub fn call_sync<F>(
        &self,
        method_name: &str,
        target: &dyn Serializable,
        args: &[&dyn Serializable],
        kwargs: &BTreeMap<String, &dyn Serializable>,
        call_site: CallSite,
        page_url: Option<String>,
        exec: F,
    ) -> anyhow::Result<ProxyOutcome>
    where
        F: FnOnce(Vec<Value>, HashMap<String, Value>) -> Result<Value, ExceptionInfo>,
    {
        let runtime = sync_bridge_runtime();
        runtime.block_on(self.call_async(method_name, target, args, kwargs, call_site, page_url, |a, k| std::future::ready(exec(a, k))))
    }
}

fn sync_bridge_runtime() -> &'static tokio::runtime::Runtime {
    static RUNTIME: once_cell::sync::OnceCell<tokio::runtime::Runtime> = once_cell::sync::OnceCell::new();
    RUNTIME.get_or_init(|| tokio::runtime::Builder::new_current_thread().enable_all().build().expect("failed to build sync bridge runtime"))
}

fn decode_action_payload(payload: &ActionPayload) -> anyhow::Result<Value> {
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::STANDARD.decode(&payload.data)?;
    let wire = Payload::new(payload.cid.clone(), payload.serialization_format, bytes);
    match cideldill_codec::decode(&wire)? {
        DecodedValue::Value(v) => Ok(v),
        DecodedValue::Placeholder(p) => Ok(serde_json::to_value(p)?),
    }
}

fn extract_pause_id(poll_url: &str) -> Option<Uuid> {
    poll_url.rsplit('/').next().and_then(|s| Uuid::parse_str(s).ok())
}

fn extract_missing_cids(error: &anyhow::Error) -> Option<Vec<String>> {
    let message = error.to_string();
    let start = message.find('{')?;
    let body: Value = serde_json::from_str(&message[start..]).ok()?;
    if body.get("error")?.as_str()? != "cid_not_found" {
        return None;
    }
    let cids = body.get("missing_cids")?.as_array()?;
    Some(cids.iter().filter_map(|v| v.as_str().map(String::from)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_call_site() -> CallSite {
        CallSite { filename: "main.rs".to_string(), lineno: 1, function: "main".to_string(), code_context: None, timestamp: 0.0, stack_trace: Vec::new() }
    }

    #[tokio::test]
    async fn disabled_engine_executes_directly_without_contacting_the_server() {
        let engine = ProxyEngine::new("http://127.0.0.1:1", 0.0);
        engine.set_enabled(false);

        let target = 7i32;
        let outcome = engine
            .call_async("widgets.create", &target, &[], &BTreeMap::new(), sample_call_site(), None, |_args, _kwargs| async { Ok(Value::from(42)) })
            .await
            .unwrap();

        match outcome {
            ProxyOutcome::Value(v) => assert_eq!(v, Value::from(42)),
            ProxyOutcome::Exception(_) => panic!("expected a value"),
        }
    }

    #[tokio::test]
    async fn transparent_methods_bypass_interception() {
        let engine = ProxyEngine::new("http://127.0.0.1:1", 0.0);
        let target = 7i32;
        let outcome = engine
            .call_async("__repr__", &target, &[], &BTreeMap::new(), sample_call_site(), None, |_args, _kwargs| async { Ok(Value::from("<target>")) })
            .await
            .unwrap();
        match outcome {
            ProxyOutcome::Value(v) => assert_eq!(v, Value::from("<target>")),
            ProxyOutcome::Exception(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn extract_pause_id_reads_the_trailing_uuid_segment() {
        let pause_id = Uuid::new_v4();
        let url = format!("/api/poll/{pause_id}");
        assert_eq!(extract_pause_id(&url), Some(pause_id));
    }

    #[test]
    fn extract_pause_id_is_none_for_garbage() {
        assert_eq!(extract_pause_id("/api/poll/not-a-uuid"), None);
    }

    #[test]
    fn extract_missing_cids_reads_the_error_body() {
        let error = anyhow::anyhow!(r#"control plane returned 400 Bad Request: {{"error":"cid_not_found","missing_cids":["abc","def"]}}"#);
        assert_eq!(extract_missing_cids(&error), Some(vec!["abc".to_string(), "def".to_string()]));
    }

    #[test]
    fn extract_missing_cids_is_none_for_other_errors() {
        let error = anyhow::anyhow!(r#"control plane returned 400 Bad Request: {{"error":"bad_request"}}"#);
        assert_eq!(extract_missing_cids(&error), None);
    }
}
