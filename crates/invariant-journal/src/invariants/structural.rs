//! Structural invariants (S-1 through S-5).
//!
//! These checks enforce the physical integrity of the journal as an
//! append-only, 0-indexed event log with well-defined lifecycle bookends.
//! They run before any domain-level checks because later invariants rely
//! on structural soundness (e.g., sequence == index).

use super::InvariantState;
use crate::error::JournalViolation;
use invariant_types::{EventType, JournalEntry};

/// Validate structural invariants against the current accumulated state.
///
/// Checks are ordered so that sequence integrity (S-1) and lifecycle start
/// (S-2) are verified before terminal-event rules (S-3/S-4/S-5), since the
/// latter depend on coherent sequence numbering. Within the terminal group,
/// S-3 (duplicate terminal) takes precedence over S-4 (post-terminal append).
pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    // S-1: Sequence numbers must equal their 0-based array index.
    // `state.len` is the count of entries already ingested, so the next
    // entry must carry `sequence == len`.
    debug_assert!(state.len <= u64::MAX as usize);
    let expected = state.len as u64;
    if entry.sequence != expected {
        return Err(JournalViolation::NonMonotonicSequence {
            entry_index: state.len,
            expected,
            actual: entry.sequence,
        });
    }

    // S-2: The very first event must be `ExecutionStarted`.
    if state.len == 0 && !matches!(entry.event, EventType::ExecutionStarted { .. }) {
        return Err(JournalViolation::MissingExecutionStarted {
            first_event: entry.event.name().to_string(),
        });
    }

    // S-3 / S-4: Terminal event finality.
    // Once a terminal event has been recorded, the journal is sealed:
    //   - Another terminal is a uniqueness violation (S-3).
    //   - A non-terminal is a "terminal not last" violation (S-4).
    if let Some(first_at) = state.terminal_seq {
        if entry.event.is_terminal() {
            return Err(JournalViolation::MultipleTerminalEvents {
                first_at,
                second_at: entry.sequence,
            });
        }
        return Err(JournalViolation::TerminalNotLast {
            terminal_seq: first_at,
            journal_len: state.len.saturating_add(1),
        });
    }

    // S-5: `ExecutionCancelled` requires a prior `CancelRequested`.
    if matches!(entry.event, EventType::ExecutionCancelled { .. }) && !state.has_cancel_requested {
        return Err(JournalViolation::CancelledWithoutRequest {
            cancelled_seq: entry.sequence,
        });
    }

    Ok(())
}
