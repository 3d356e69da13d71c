//! Client Proxy Engine: wraps a target, mediates every call through the
//! control plane, the way `sem_os_client` wraps `CoreService` behind
//! `HttpClient`/`InProcessClient` — generalized here to wrap arbitrary Rust
//! closures instead of one fixed trait surface.

pub mod cid_cache;
pub mod deadlock_watchdog;
pub mod http;
pub mod proxy;
pub mod registry;

pub use deadlock_watchdog::DeadlockWatchdog;
pub use http::ControlPlaneClient;
pub use proxy::{ProxyEngine, ProxyOutcome};
pub use registry::FunctionRegistry;

pub use http::call_site;
