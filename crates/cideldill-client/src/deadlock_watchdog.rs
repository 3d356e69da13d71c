//! Logs a warning when a tracked operation stalls past a configured
//! threshold. Observability only — it never cancels anything.
//!
//! Rust has no equivalent of `sys._current_frames()`, so unlike the
//! watchdog this is ported from, there is no thread-by-thread stack dump
//! to attach to the warning. The log line instead carries the stalled
//! operation's label, its age, and how many operations are in flight,
//! which is the information a caller can actually act on.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct TrackedOperation {
    label: String,
    started_at: Instant,
}

struct State {
    operations: HashMap<u64, TrackedOperation>,
    next_id: u64,
}

pub struct DeadlockWatchdog {
    state: Mutex<State>,
    stop: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

/// RAII handle returned by [`DeadlockWatchdog::track`]; ends tracking on drop.
pub struct TrackedGuard<'a> {
    watchdog: &'a DeadlockWatchdog,
    operation_id: u64,
}

impl Drop for TrackedGuard<'_> {
    fn drop(&mut self) {
        self.watchdog.track_end(self.operation_id);
    }
}

impl DeadlockWatchdog {
    pub fn new(timeout: Duration, log_interval: Duration) -> std::sync::Arc<Self> {
        assert!(timeout > Duration::ZERO, "timeout must be > 0");
        assert!(log_interval > Duration::ZERO, "log_interval must be > 0");

        let watchdog = std::sync::Arc::new(Self {
            state: Mutex::new(State { operations: HashMap::new(), next_id: 0 }),
            stop: Mutex::new(None),
            thread: Mutex::new(None),
        });

        let (stop_tx, stop_rx) = mpsc::channel();
        *watchdog.stop.lock().expect("watchdog lock poisoned") = Some(stop_tx);

        let worker = watchdog.clone();
        let check_interval = timeout.div_f64(4.0).clamp(Duration::from_millis(100), Duration::from_secs(1));
        let handle = std::thread::Builder::new()
            .name("cideldill-deadlock-watchdog".to_string())
            .spawn(move || worker.run(stop_rx, check_interval, timeout, log_interval))
            .expect("failed to spawn deadlock watchdog thread");
        *watchdog.thread.lock().expect("watchdog lock poisoned") = Some(handle);

        watchdog
    }

    pub fn close(&self) {
        if let Some(stop) = self.stop.lock().expect("watchdog lock poisoned").take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.thread.lock().expect("watchdog lock poisoned").take() {
            let _ = handle.join();
        }
    }

    pub fn track_start(&self, label: impl Into<String>) -> u64 {
        let mut state = self.state.lock().expect("watchdog lock poisoned");
        state.next_id += 1;
        let id = state.next_id;
        state.operations.insert(id, TrackedOperation { label: label.into(), started_at: Instant::now() });
        id
    }

    pub fn track_end(&self, operation_id: u64) {
        self.state.lock().expect("watchdog lock poisoned").operations.remove(&operation_id);
    }

    pub fn track(&self, label: impl Into<String>) -> TrackedGuard<'_> {
        TrackedGuard { operation_id: self.track_start(label), watchdog: self }
    }

    fn stalled_snapshot(&self, timeout: Duration) -> Option<(String, usize, Duration)> {
        let state = self.state.lock().expect("watchdog lock poisoned");
        let oldest = state.operations.values().min_by_key(|op| op.started_at)?;
        let age = oldest.started_at.elapsed();
        if age < timeout {
            return None;
        }
        Some((oldest.label.clone(), state.operations.len(), age))
    }

    fn run(self: std::sync::Arc<Self>, stop_rx: std::sync::mpsc::Receiver<()>, check_interval: Duration, timeout: Duration, log_interval: Duration) {
        let mut last_dump_at: Option<Instant> = None;
        loop {
            match stop_rx.recv_timeout(check_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {}
            }

            let Some((label, count, age)) = self.stalled_snapshot(timeout) else { continue };
            if last_dump_at.is_some_and(|t| t.elapsed() < log_interval) {
                continue;
            }
            last_dump_at = Some(Instant::now());
            tracing::warn!(
                operation = %label,
                age_s = age.as_secs_f64(),
                active_operations = count,
                timeout_s = timeout.as_secs_f64(),
                "potential deadlock detected in cideldill client"
            );
        }
    }
}

impl Drop for DeadlockWatchdog {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_start_and_end_balances_operation_count() {
        let watchdog = DeadlockWatchdog::new(Duration::from_secs(10), Duration::from_secs(60));
        let id = watchdog.track_start("slow-call");
        assert_eq!(watchdog.state.lock().unwrap().operations.len(), 1);
        watchdog.track_end(id);
        assert_eq!(watchdog.state.lock().unwrap().operations.len(), 0);
        watchdog.close();
    }

    #[test]
    fn guard_ends_tracking_on_drop() {
        let watchdog = DeadlockWatchdog::new(Duration::from_secs(10), Duration::from_secs(60));
        {
            let _guard = watchdog.track("scoped-call");
            assert_eq!(watchdog.state.lock().unwrap().operations.len(), 1);
        }
        assert_eq!(watchdog.state.lock().unwrap().operations.len(), 0);
        watchdog.close();
    }

    #[test]
    fn stalled_snapshot_is_none_below_timeout() {
        let watchdog = DeadlockWatchdog::new(Duration::from_secs(10), Duration::from_secs(60));
        let _id = watchdog.track_start("fresh-call");
        assert!(watchdog.stalled_snapshot(Duration::from_secs(10)).is_none());
        watchdog.close();
    }
}
