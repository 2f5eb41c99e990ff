//! Side-effect invariants (SE-1 through SE-6).
//!
//! These checks enforce the invoke lifecycle:
//! Scheduled -> Started -> (Completed | Retrying* | Failed | TimedOut | Stopped).
//! Each phase is gated on its predecessor, and reaching any of Completed,
//! Failed, TimedOut, or Stopped is a terminal absorbing state for that
//! promise: no further lifecycle event may reference it afterwards.
//!
//! SE-3 checks the `(promise_id, failed_attempt)` pair rather than just
//! `promise_id`, ensuring that a retry references the exact attempt that was
//! started.

use invariant_types::{EventType, JournalEntry};

use crate::error::JournalViolation;

use super::InvariantState;

/// Validate side-effect invariants against the current accumulated state.
///
/// Within each event arm, terminal-finality (SE-4) is checked before the
/// predecessor checks. This precedence prevents misleading "missing
/// predecessor" errors when the real problem is that the promise's lifecycle
/// has already terminated.
pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    match &entry.event {
        EventType::InvokeStarted { promise_id, .. } => {
            if state.invoke_terminal_pids.contains(promise_id) {
                return Err(JournalViolation::EventAfterInvokeTerminal {
                    promise_id: promise_id.clone(),
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state.scheduled_pids.contains(promise_id) {
                return Err(JournalViolation::StartedWithoutScheduled {
                    promise_id: promise_id.clone(),
                    started_seq: entry.sequence,
                });
            }
        }
        EventType::InvokeCompleted { promise_id, .. } => {
            if !state.started_pids.contains(promise_id) {
                return Err(JournalViolation::CompletedWithoutStarted {
                    promise_id: promise_id.clone(),
                    completed_seq: entry.sequence,
                });
            }
            if state.invoke_terminal_pids.contains(promise_id) {
                return Err(JournalViolation::EventAfterInvokeTerminal {
                    promise_id: promise_id.clone(),
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
        }
        EventType::InvokeRetrying {
            promise_id,
            failed_attempt,
            ..
        } => {
            if state.invoke_terminal_pids.contains(promise_id) {
                return Err(JournalViolation::EventAfterInvokeTerminal {
                    promise_id: promise_id.clone(),
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state
                .started_attempts
                .contains(&(promise_id.clone(), *failed_attempt))
            {
                return Err(JournalViolation::RetryingWithoutStarted {
                    promise_id: promise_id.clone(),
                    failed_attempt: *failed_attempt,
                    retrying_seq: entry.sequence,
                });
            }
        }
        EventType::InvokeFailed { promise_id, .. } => {
            if state.invoke_terminal_pids.contains(promise_id) {
                return Err(JournalViolation::EventAfterInvokeTerminal {
                    promise_id: promise_id.clone(),
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state.started_pids.contains(promise_id) {
                return Err(JournalViolation::FailedWithoutStarted {
                    promise_id: promise_id.clone(),
                    failed_seq: entry.sequence,
                });
            }
        }
        EventType::InvokeTimedOut { promise_id } | EventType::InvokeStopped { promise_id } => {
            if state.invoke_terminal_pids.contains(promise_id) {
                return Err(JournalViolation::EventAfterInvokeTerminal {
                    promise_id: promise_id.clone(),
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state.started_pids.contains(promise_id) {
                return Err(JournalViolation::TerminalWithoutStarted {
                    promise_id: promise_id.clone(),
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
        }
        _ => {}
    }
    Ok(())
}
