use invariant_types::PromiseId;

/// Describes a specific journal invariant violation.
///
/// Grouped: Structural (S-1..S-5), Side Effects / Invoke (SE-1..SE-6),
/// Control Flow (CF-1..CF-2), Callback (CB-1..CB-2), Context (CTX-1..CTX-2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalViolation {
    /// S-1: Sequence numbers must equal their array index (0-indexed, strict equality).
    NonMonotonicSequence {
        entry_index: usize,
        expected: u64,
        actual: u64,
    },
    /// S-2: The first event in every journal must be `ExecutionStarted`.
    MissingExecutionStarted { first_event: String },
    /// S-3: At most one terminal event (`Completed`, `Failed`, `Cancelled`) per journal.
    MultipleTerminalEvents { first_at: u64, second_at: u64 },
    /// S-4: A terminal event must be the last entry in the journal.
    TerminalNotLast {
        terminal_seq: u64,
        journal_len: usize,
    },
    /// S-5: `ExecutionCancelled` requires a preceding `CancelRequested`.
    CancelledWithoutRequest { cancelled_seq: u64 },

    /// SE-1: `InvokeStarted` requires a preceding `InvokeScheduled` for the same promise.
    StartedWithoutScheduled {
        promise_id: PromiseId,
        started_seq: u64,
    },
    /// SE-2: `InvokeCompleted` requires a preceding `InvokeStarted` for the same promise.
    CompletedWithoutStarted {
        promise_id: PromiseId,
        completed_seq: u64,
    },
    /// SE-3: `InvokeRetrying` requires a preceding `InvokeStarted` with the matching attempt.
    RetryingWithoutStarted {
        promise_id: PromiseId,
        failed_attempt: u32,
        retrying_seq: u64,
    },
    /// SE-4: no further lifecycle event for a promise once it reached a terminal
    /// invoke state (`Completed`, `Failed`, `TimedOut`, `Stopped`).
    EventAfterInvokeTerminal {
        promise_id: PromiseId,
        offending_seq: u64,
        offending_event: String,
    },
    /// SE-5: `InvokeFailed` requires a preceding `InvokeStarted` for the same promise.
    FailedWithoutStarted {
        promise_id: PromiseId,
        failed_seq: u64,
    },
    /// SE-6: `InvokeTimedOut`/`InvokeStopped` require a preceding `InvokeStarted`.
    TerminalWithoutStarted {
        promise_id: PromiseId,
        offending_seq: u64,
        offending_event: String,
    },

    /// CF-1: `TimerFired` requires a preceding `TimerScheduled` for the same promise.
    TimerFiredWithoutScheduled {
        promise_id: PromiseId,
        fired_seq: u64,
    },
    /// CF-2: `ExecutionAwaiting` must reference a promise already present in the journal.
    AwaitingUnknownPromise {
        promise_id: PromiseId,
        awaiting_seq: u64,
    },

    /// CB-1: any callback event besides `CallbackScheduled` requires a preceding
    /// `CallbackScheduled` for the same promise.
    CallbackEventWithoutScheduled {
        promise_id: PromiseId,
        offending_seq: u64,
        offending_event: String,
    },
    /// CB-2: no further callback event once a terminal outcome (`Succeeded`,
    /// `Failed`, `TimedOut`) has been recorded for the promise.
    EventAfterCallbackTerminal {
        promise_id: PromiseId,
        offending_seq: u64,
        offending_event: String,
    },

    /// CTX-1: `ContextCompleted`/`ContextFailed` requires a preceding `ContextStarted`.
    ContextTerminalWithoutStarted {
        promise_id: PromiseId,
        offending_seq: u64,
        offending_event: String,
    },
    /// CTX-2: no further context event once a terminal outcome has been recorded.
    EventAfterContextTerminal {
        promise_id: PromiseId,
        offending_seq: u64,
        offending_event: String,
    },
}

/// Errors produced by journal operations.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal is empty")]
    EmptyJournal,
    #[error("invariant violation: {0}")]
    InvariantViolation(JournalViolation),
}

impl std::fmt::Display for JournalViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonMonotonicSequence {
                entry_index,
                expected,
                actual,
            } => write!(
                f,
                "S-1: non-monotonic sequence at index {entry_index}: expected {expected}, got {actual}"
            ),
            Self::MissingExecutionStarted { first_event } => write!(
                f,
                "S-2: first event must be ExecutionStarted, got {first_event}"
            ),
            Self::MultipleTerminalEvents {
                first_at,
                second_at,
            } => write!(
                f,
                "S-3: multiple terminal events at seq {first_at} and {second_at}"
            ),
            Self::TerminalNotLast {
                terminal_seq,
                journal_len,
            } => write!(
                f,
                "S-4: terminal event at seq {terminal_seq} is not last (journal len {journal_len})"
            ),
            Self::CancelledWithoutRequest { cancelled_seq } => write!(
                f,
                "S-5: ExecutionCancelled at seq {cancelled_seq} without prior CancelRequested"
            ),
            Self::StartedWithoutScheduled {
                promise_id,
                started_seq,
            } => write!(
                f,
                "SE-1: InvokeStarted at seq {started_seq} for {promise_id} without prior InvokeScheduled"
            ),
            Self::CompletedWithoutStarted {
                promise_id,
                completed_seq,
            } => write!(
                f,
                "SE-2: InvokeCompleted at seq {completed_seq} for {promise_id} without prior InvokeStarted"
            ),
            Self::RetryingWithoutStarted {
                promise_id,
                failed_attempt,
                retrying_seq,
            } => write!(
                f,
                "SE-3: InvokeRetrying at seq {retrying_seq} for {promise_id} attempt {failed_attempt} without matching InvokeStarted"
            ),
            Self::EventAfterInvokeTerminal {
                promise_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "SE-4: {offending_event} at seq {offending_seq} for {promise_id} after invoke reached a terminal state"
            ),
            Self::FailedWithoutStarted {
                promise_id,
                failed_seq,
            } => write!(
                f,
                "SE-5: InvokeFailed at seq {failed_seq} for {promise_id} without prior InvokeStarted"
            ),
            Self::TerminalWithoutStarted {
                promise_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "SE-6: {offending_event} at seq {offending_seq} for {promise_id} without prior InvokeStarted"
            ),
            Self::TimerFiredWithoutScheduled {
                promise_id,
                fired_seq,
            } => write!(
                f,
                "CF-1: TimerFired at seq {fired_seq} for {promise_id} without prior TimerScheduled"
            ),
            Self::AwaitingUnknownPromise {
                promise_id,
                awaiting_seq,
            } => write!(
                f,
                "CF-2: ExecutionAwaiting at seq {awaiting_seq} references unknown promise {promise_id}"
            ),
            Self::CallbackEventWithoutScheduled {
                promise_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "CB-1: {offending_event} at seq {offending_seq} for {promise_id} without prior CallbackScheduled"
            ),
            Self::EventAfterCallbackTerminal {
                promise_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "CB-2: {offending_event} at seq {offending_seq} for {promise_id} after callback reached a terminal state"
            ),
            Self::ContextTerminalWithoutStarted {
                promise_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "CTX-1: {offending_event} at seq {offending_seq} for {promise_id} without prior ContextStarted"
            ),
            Self::EventAfterContextTerminal {
                promise_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "CTX-2: {offending_event} at seq {offending_seq} for {promise_id} after context reached a terminal state"
            ),
        }
    }
}
