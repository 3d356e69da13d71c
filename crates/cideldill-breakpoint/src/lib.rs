//! Thread-safe breakpoint and pause-coordination authority: the single
//! source of truth a server's handlers and REPL evaluator read and mutate.

pub mod manager;

pub use manager::{cid_store_for, BreakpointManager, Observer};
