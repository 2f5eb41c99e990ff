//! Journal invariant checking engine.
//!
//! Provides two modes of validation:
//! - **Incremental** ([`InvariantState::check_append`]): O(1) per entry via auxiliary state.
//!   Used at append time to reject invalid entries before they hit the journal.
//! - **Batch** ([`validate_journal`]): O(n) full scan that collects all violations.
//!   Used for diagnostics and journal recovery.
//!
//! Invariants are grouped into five sub-modules:
//! - [`structural`] (S-1..S-5): Sequence numbering, lifecycle bookends, terminal uniqueness.
//! - [`side_effects`] (SE-1..SE-6): Invoke lifecycle ordering (Scheduled -> Started -> terminal).
//! - [`control_flow`] (CF-1..CF-2): Timer and suspension consistency.
//! - [`callbacks`] (CB-1..CB-2): Callback lifecycle ordering.
//! - [`context`] (CTX-1..CTX-2): Child context lifecycle ordering.
//!
//! Each sub-module exposes a single `check(&InvariantState, &JournalEntry) -> Result<(), JournalViolation>`
//! function. Sub-modules are read-only over state; all mutations happen in [`InvariantState::apply_entry`].

mod callbacks;
mod context;
mod control_flow;
mod side_effects;
mod structural;

use crate::error::JournalViolation;
use invariant_types::{EventType, ExecutionJournal, JournalEntry, PromiseId};
use std::collections::HashSet;

/// Accumulated auxiliary state for O(1) incremental invariant checking.
///
/// Each field tracks just enough information from previously ingested entries
/// to validate the next append without rescanning the journal. Fields are
/// `pub(crate)` so sub-module checkers can read them; only [`apply_entry`]
/// mutates them.
#[derive(Clone, Debug, Default)]
pub struct InvariantState {
    /// Number of entries ingested so far. Used by S-1 (expected sequence == len).
    pub(crate) len: usize,

    /// Sequence number of the first terminal event, if any. Used by S-3 and S-4.
    /// `Some` implies a terminal has been seen; `None` means the journal is still open.
    pub(crate) terminal_seq: Option<u64>,

    /// Whether a `CancelRequested` event has been seen. Required by S-5
    /// before `ExecutionCancelled` is allowed.
    pub(crate) has_cancel_requested: bool,

    /// Promise IDs from `InvokeScheduled` events. Checked by SE-1 and CF-2.
    pub(crate) scheduled_pids: HashSet<PromiseId>,

    /// Promise IDs from `InvokeStarted` events. Checked by SE-2, SE-5, SE-6.
    pub(crate) started_pids: HashSet<PromiseId>,

    /// `(promise_id, attempt)` pairs from `InvokeStarted` events. Checked by SE-3.
    pub(crate) started_attempts: HashSet<(PromiseId, u32)>,

    /// Promise IDs that reached an invoke terminal state (`Completed`, `Failed`,
    /// `TimedOut`, `Stopped`). Checked by SE-4.
    pub(crate) invoke_terminal_pids: HashSet<PromiseId>,

    /// Promise IDs from `TimerScheduled` events. Checked by CF-1.
    pub(crate) scheduled_timer_pids: HashSet<PromiseId>,

    /// Promise IDs from `CallbackScheduled` events. Checked by CB-1 and CF-2.
    pub(crate) callback_scheduled_pids: HashSet<PromiseId>,

    /// Promise IDs that reached a callback terminal state (`Succeeded`,
    /// `Failed`, `TimedOut`). Checked by CB-2.
    pub(crate) callback_terminal_pids: HashSet<PromiseId>,

    /// Promise IDs from `ContextStarted` events. Checked by CTX-1 and CF-2.
    pub(crate) context_started_pids: HashSet<PromiseId>,

    /// Promise IDs that reached a context terminal state (`Completed`, `Failed`).
    /// Checked by CTX-2.
    pub(crate) context_terminal_pids: HashSet<PromiseId>,
}

impl InvariantState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `promise_id` has been introduced by any scheduling event so far.
    /// Used by CF-2 to reject an `ExecutionAwaiting` that references a promise
    /// the handler never scheduled.
    pub(crate) fn is_known_promise(&self, promise_id: &PromiseId) -> bool {
        self.scheduled_pids.contains(promise_id)
            || self.callback_scheduled_pids.contains(promise_id)
            || self.context_started_pids.contains(promise_id)
            || self.scheduled_timer_pids.contains(promise_id)
    }

    /// Validate and ingest a single journal entry (incremental path).
    ///
    /// Runs all invariant checks against the current accumulated state,
    /// then updates state on success. Short-circuits on the first violation
    /// within each group, and bails across groups via `?`.
    pub fn check_append(&mut self, entry: &JournalEntry) -> Result<(), JournalViolation> {
        structural::check(self, entry)?;
        side_effects::check(self, entry)?;
        control_flow::check(self, entry)?;
        callbacks::check(self, entry)?;
        context::check(self, entry)?;
        self.apply_entry(entry);
        Ok(())
    }

    /// Run all invariant groups, collecting up to one violation per group.
    ///
    /// Unlike [`check_append`], this does not short-circuit across groups --
    /// all groups run regardless of earlier failures. Used by
    /// [`validate_journal`] to surface multiple independent issues in a
    /// single pass over a corrupt journal.
    fn collect_entry_violations(&self, entry: &JournalEntry, violations: &mut Vec<JournalViolation>) {
        if let Err(v) = structural::check(self, entry) {
            violations.push(v);
        }
        if let Err(v) = side_effects::check(self, entry) {
            violations.push(v);
        }
        if let Err(v) = control_flow::check(self, entry) {
            violations.push(v);
        }
        if let Err(v) = callbacks::check(self, entry) {
            violations.push(v);
        }
        if let Err(v) = context::check(self, entry) {
            violations.push(v);
        }
    }

    /// Update auxiliary state after an entry passes validation (or is force-applied
    /// during batch validation).
    ///
    /// Centralized here rather than spread across sub-modules so that all state
    /// mutations are visible in one place. Increments `len` as the final step.
    fn apply_entry(&mut self, entry: &JournalEntry) {
        match &entry.event {
            // S-3/S-4: record first terminal sequence number
            EventType::ExecutionCompleted { .. }
            | EventType::ExecutionFailed { .. }
            | EventType::ExecutionCancelled { .. } => {
                self.terminal_seq.get_or_insert(entry.sequence);
            }
            // S-5: gate for ExecutionCancelled
            EventType::CancelRequested { .. } => {
                self.has_cancel_requested = true;
            }
            // SE-1, CF-2: InvokeStarted / ExecutionAwaiting require this
            EventType::InvokeScheduled { promise_id, .. } => {
                self.scheduled_pids.insert(promise_id.clone());
            }
            // SE-2, SE-3, SE-5, SE-6: invoke lifecycle requires this
            EventType::InvokeStarted { promise_id, attempt } => {
                self.started_pids.insert(promise_id.clone());
                self.started_attempts.insert((promise_id.clone(), *attempt));
            }
            // SE-4: terminal, blocks further invoke lifecycle events
            EventType::InvokeCompleted { promise_id, .. }
            | EventType::InvokeFailed { promise_id, .. }
            | EventType::InvokeTimedOut { promise_id }
            | EventType::InvokeStopped { promise_id } => {
                self.invoke_terminal_pids.insert(promise_id.clone());
            }
            // CF-1: TimerFired requires this
            EventType::TimerScheduled { promise_id, .. } => {
                self.scheduled_timer_pids.insert(promise_id.clone());
            }
            // CB-1, CF-2: callback lifecycle requires this
            EventType::CallbackScheduled { promise_id, .. } => {
                self.callback_scheduled_pids.insert(promise_id.clone());
            }
            // CB-2: terminal, blocks further callback events
            EventType::CallbackSucceeded { promise_id, .. }
            | EventType::CallbackFailed { promise_id, .. }
            | EventType::CallbackTimedOut { promise_id } => {
                self.callback_terminal_pids.insert(promise_id.clone());
            }
            // CTX-1, CF-2: context lifecycle requires this
            EventType::ContextStarted { promise_id, .. } => {
                self.context_started_pids.insert(promise_id.clone());
            }
            // CTX-2: terminal, blocks further context events
            EventType::ContextCompleted { promise_id, .. }
            | EventType::ContextFailed { promise_id, .. } => {
                self.context_terminal_pids.insert(promise_id.clone());
            }
            // Events that don't contribute to invariant state:
            // ExecutionStarted, ExecutionAwaiting, ExecutionResumed,
            // InvokeRetrying, TimerFired, RandomGenerated, TimeRecorded,
            // CallbackHeartbeat
            _ => {}
        }
        self.len += 1;
    }
}

/// Batch-validate an entire journal, returning all detected violations.
///
/// Creates a fresh [`InvariantState`] and feeds every entry through
/// [`InvariantState::collect_entry_violations`], always applying state
/// regardless of errors so that later entries are checked against accurate
/// accumulated state. An empty journal is reported as
/// [`JournalViolation::MissingExecutionStarted`].
pub fn validate_journal(journal: &ExecutionJournal) -> Vec<JournalViolation> {
    if journal.entries.is_empty() {
        return vec![JournalViolation::MissingExecutionStarted {
            first_event: "<empty>".to_string(),
        }];
    }

    let mut state = InvariantState::new();
    let mut violations = Vec::new();

    for entry in &journal.entries {
        state.collect_entry_violations(entry, &mut violations);
        state.apply_entry(entry);
    }

    violations
}
