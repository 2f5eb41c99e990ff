//! Context invariants (CTX-1 and CTX-2).
//!
//! Child contexts follow Started -> (Completed | Failed). CTX-1 gates the
//! terminal events on a preceding `ContextStarted`; CTX-2 treats either
//! terminal event as absorbing for that promise.

use invariant_types::{EventType, JournalEntry};

use crate::error::JournalViolation;

use super::InvariantState;

pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    let promise_id = match &entry.event {
        EventType::ContextCompleted { promise_id, .. } | EventType::ContextFailed { promise_id, .. } => {
            promise_id
        }
        _ => return Ok(()),
    };

    if state.context_terminal_pids.contains(promise_id) {
        return Err(JournalViolation::EventAfterContextTerminal {
            promise_id: promise_id.clone(),
            offending_seq: entry.sequence,
            offending_event: entry.event.name().to_string(),
        });
    }
    if !state.context_started_pids.contains(promise_id) {
        return Err(JournalViolation::ContextTerminalWithoutStarted {
            promise_id: promise_id.clone(),
            offending_seq: entry.sequence,
            offending_event: entry.event.name().to_string(),
        });
    }

    Ok(())
}
