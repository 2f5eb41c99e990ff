//! Callback invariants (CB-1 and CB-2).
//!
//! Callbacks follow Scheduled -> (Heartbeat* -> (Succeeded | Failed | TimedOut)).
//! CB-1 gates every non-Scheduled event on a preceding `CallbackScheduled`.
//! CB-2 treats any of the three outcomes as terminal for that promise.

use invariant_types::{EventType, JournalEntry};

use crate::error::JournalViolation;

use super::InvariantState;

pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    let promise_id = match &entry.event {
        EventType::CallbackHeartbeat { promise_id }
        | EventType::CallbackSucceeded { promise_id, .. }
        | EventType::CallbackFailed { promise_id, .. }
        | EventType::CallbackTimedOut { promise_id } => promise_id,
        _ => return Ok(()),
    };

    if state.callback_terminal_pids.contains(promise_id) {
        return Err(JournalViolation::EventAfterCallbackTerminal {
            promise_id: promise_id.clone(),
            offending_seq: entry.sequence,
            offending_event: entry.event.name().to_string(),
        });
    }
    if !state.callback_scheduled_pids.contains(promise_id) {
        return Err(JournalViolation::CallbackEventWithoutScheduled {
            promise_id: promise_id.clone(),
            offending_seq: entry.sequence,
            offending_event: entry.event.name().to_string(),
        });
    }

    Ok(())
}
