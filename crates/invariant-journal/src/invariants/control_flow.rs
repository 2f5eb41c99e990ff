//! Control-flow invariants (CF-1 and CF-2).
//!
//! CF-1 enforces the two-phase timer lifecycle (Scheduled -> Fired). CF-2
//! enforces that a suspension point only ever references a promise that is
//! already known to the journal: a handler cannot block on an operation it
//! never scheduled.

use invariant_types::{EventType, JournalEntry};

use crate::error::JournalViolation;

use super::InvariantState;

pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    match &entry.event {
        EventType::TimerFired { promise_id } => {
            if !state.scheduled_timer_pids.contains(promise_id) {
                return Err(JournalViolation::TimerFiredWithoutScheduled {
                    promise_id: promise_id.clone(),
                    fired_seq: entry.sequence,
                });
            }
        }
        EventType::ExecutionAwaiting { promise_id } => {
            if !state.is_known_promise(promise_id) {
                return Err(JournalViolation::AwaitingUnknownPromise {
                    promise_id: promise_id.clone(),
                    awaiting_seq: entry.sequence,
                });
            }
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use invariant_types::PromiseId;

    fn pid(tag: u8) -> PromiseId {
        PromiseId::new([tag; 32])
    }

    fn mk_entry(sequence: u64, event: EventType) -> JournalEntry {
        JournalEntry {
            sequence,
            timestamp: std::time::SystemTime::UNIX_EPOCH.into(),
            event,
        }
    }

    #[test]
    fn cf1_timer_fired_without_scheduled_reports_timer_fired_without_scheduled() {
        let p = pid(1);
        let state = InvariantState::default();
        let entry = mk_entry(
            2,
            EventType::TimerFired {
                promise_id: p.clone(),
            },
        );

        let got = check(&state, &entry).unwrap_err();
        assert_eq!(
            got,
            JournalViolation::TimerFiredWithoutScheduled {
                promise_id: p,
                fired_seq: 2,
            }
        );
    }

    #[test]
    fn cf1_timer_fired_with_prior_scheduled_passes() {
        let p = pid(2);
        let state = InvariantState {
            scheduled_timer_pids: std::iter::once(p.clone()).collect(),
            ..Default::default()
        };
        let entry = mk_entry(3, EventType::TimerFired { promise_id: p });

        assert!(check(&state, &entry).is_ok());
    }

    #[test]
    fn cf2_awaiting_unknown_promise_is_rejected() {
        let state = InvariantState::default();
        let entry = mk_entry(
            4,
            EventType::ExecutionAwaiting {
                promise_id: pid(3),
            },
        );

        let got = check(&state, &entry).unwrap_err();
        assert!(matches!(got, JournalViolation::AwaitingUnknownPromise { .. }));
    }

    #[test]
    fn cf2_awaiting_scheduled_invoke_passes() {
        let p = pid(4);
        let state = InvariantState {
            scheduled_pids: std::iter::once(p.clone()).collect(),
            ..Default::default()
        };
        let entry = mk_entry(5, EventType::ExecutionAwaiting { promise_id: p });

        assert!(check(&state, &entry).is_ok());
    }
}
