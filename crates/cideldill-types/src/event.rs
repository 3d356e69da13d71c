use uuid::Uuid;

use crate::breakpoint::PausedExecution;
use crate::call::CallRecord;

/// Observer fan-out events dispatched by the Breakpoint Manager, in the
/// order `execution_paused -> execution_resumed` per pause.
#[derive(Debug, Clone)]
pub enum Event {
    ExecutionPaused(Box<PausedExecution>),
    ExecutionResumed { pause_id: Uuid },
    CallCompleted(Box<CallRecord>),
    /// Fired when the codec had to degrade a value to a placeholder,
    /// surfaced on the com-errors page.
    PickleError {
        method_name: String,
        type_name: String,
        pickle_error: String,
    },
}
