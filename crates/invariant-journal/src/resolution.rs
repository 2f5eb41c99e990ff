use invariant_types::{EventType, JournalEntry, PromiseId};

/// Returns true if the invocation identified by `pid` was ever scheduled.
///
/// Scan complexity: O(n).
pub fn is_invoke_scheduled(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::InvokeScheduled { promise_id, .. } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the invocation identified by `pid` was ever started.
///
/// Scan complexity: O(n).
pub fn is_invoke_started(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::InvokeStarted { promise_id, .. } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the invocation identified by `pid` was ever completed.
///
/// Scan complexity: O(n).
pub fn is_invoke_completed(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::InvokeCompleted { promise_id, .. } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the timer identified by `pid` was ever scheduled.
///
/// Scan complexity: O(n).
pub fn is_timer_scheduled(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::TimerScheduled { promise_id, .. } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the timer identified by `pid` was ever fired.
///
/// Scan complexity: O(n).
pub fn is_timer_fired(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::TimerFired { promise_id } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the callback identified by `pid` was ever scheduled.
///
/// Scan complexity: O(n).
pub fn is_callback_scheduled(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::CallbackScheduled { promise_id, .. } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the callback identified by `pid` reached a terminal outcome
/// (`Succeeded`, `Failed`, or `TimedOut`).
///
/// Scan complexity: O(n).
pub fn is_callback_resolved(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::CallbackSucceeded { promise_id, .. }
        | EventType::CallbackFailed { promise_id, .. } => promise_id == pid,
        EventType::CallbackTimedOut { promise_id } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the child context identified by `pid` was ever started.
///
/// Scan complexity: O(n).
pub fn is_context_started(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::ContextStarted { promise_id, .. } => promise_id == pid,
        _ => false,
    })
}

/// Returns true if the child context identified by `pid` reached a terminal
/// outcome (`Completed` or `Failed`).
///
/// Scan complexity: O(n).
pub fn is_context_resolved(entries: &[JournalEntry], pid: &PromiseId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::ContextCompleted { promise_id, .. } | EventType::ContextFailed { promise_id, .. } => {
            promise_id == pid
        }
        _ => false,
    })
}

/// Returns true if a cancellation request appears anywhere in the journal.
///
/// Scan complexity: O(n).
pub fn has_cancel_requested(entries: &[JournalEntry]) -> bool {
    entries
        .iter()
        .any(|e| matches!(e.event, EventType::CancelRequested { .. }))
}

/// Returns the first terminal event in journal order, if present.
///
/// Terminal events are `ExecutionCompleted`, `ExecutionFailed`, or `ExecutionCancelled`.
/// Scan complexity: O(n).
pub fn terminal_event(entries: &[JournalEntry]) -> Option<&EventType> {
    entries.iter().find_map(|e| {
        if e.event.is_terminal() {
            Some(&e.event)
        } else {
            None
        }
    })
}

/// Counts retry attempts (`InvokeRetrying`) for invocation `pid`.
///
/// Scan complexity: O(n).
pub fn retry_count(entries: &[JournalEntry], pid: &PromiseId) -> usize {
    entries
        .iter()
        .filter(|e| match &e.event {
            EventType::InvokeRetrying { promise_id, .. } => promise_id == pid,
            _ => false,
        })
        .count()
}
