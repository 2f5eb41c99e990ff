mod error;
pub mod invariants;
mod replay;
mod resolution;
mod status;

pub use error::{JournalError, JournalViolation};
pub use invariants::{InvariantState, validate_journal};
pub use replay::{CachedResult, ReplayCache};
pub use resolution::{
    has_cancel_requested, is_callback_resolved, is_callback_scheduled, is_context_resolved,
    is_context_started, is_invoke_completed, is_invoke_scheduled, is_invoke_started,
    is_timer_fired, is_timer_scheduled, retry_count, terminal_event,
};
pub use status::{can_resume, completed_promises, derive_status, wait_resolvers};
