//! Shared data model for CID el Dill's Interception & Pause Coordination
//! Engine. No I/O lives here — just the wire/domain types every other
//! crate builds on, the way `sem_os_core::types` anchors the Semantic OS
//! crates.

pub mod breakpoint;
pub mod call;
pub mod error;
pub mod event;
pub mod payload;
pub mod repl;

pub use breakpoint::{ActionPayload, AfterBehavior, CallStartPayload, PausedExecution, PayloadRef, ResumeAction};
pub use call::{CallRecord, CallSite, CallStatus, ExceptionInfo, Frame, ProcessKey};
pub use error::{CideldillError, Result};
pub use event::Event;
pub use payload::{Format, Payload, Placeholder};
pub use repl::{ReplSession, SessionId, TranscriptEntry};
