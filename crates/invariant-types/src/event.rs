use crate::execution_error::ExecutionError;
use crate::payload::Payload;
use crate::promise_id::PromiseId;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Distinguishes a local checkpointed thunk from a remote named dispatch.
///
/// Both share the same Scheduled -> Started -> (Completed | Retrying | Failed)
/// event family; `Invoke` additionally allows the remote-outcome terminals
/// `InvokeTimedOut` and `InvokeStopped`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvokeKind {
    /// User thunk executed locally by a worker, result checkpointed.
    Step,
    /// Named function dispatched to and completed by a remote system.
    Invoke,
}

/// Delivery guarantee for a step's thunk across retries and replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepSemantics {
    /// Default. The thunk may re-execute on replay after a crash mid-attempt.
    AtLeastOncePerRetry,
    /// The thunk executes at most once per checkpointed `InvokeStarted`;
    /// replay after a crash mid-attempt returns `StepInterrupted` instead.
    AtMostOncePerRetry,
}

/// Monotonic per-execution counter identifying a callback handle.
pub type CallbackId = String;

/// All journal event types, grouped by category.
///
/// Each category satisfies a distinct formal correctness property, checked
/// by the matching group under `invariant-journal::invariants`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    // ── Category 1: Lifecycle (Soundness) ──
    /// Always the first event. Pins execution to a specific component version.
    ExecutionStarted {
        component_digest: Vec<u8>,
        input: Payload,
        parent_id: Option<PromiseId>,
        idempotency_key: String,
    },
    /// Handler returned Ok (terminal).
    ExecutionCompleted { result: Payload },
    /// Handler returned Err, or a fatal invariant was violated (terminal).
    ExecutionFailed { error: ExecutionError },
    /// External cancel signal arrived. Transitions to Cancelling.
    CancelRequested { reason: String },
    /// Cancellation finalized after cleanup (terminal). Requires preceding CancelRequested.
    ExecutionCancelled { reason: String },

    // ── Category 2: Step / Invoke (Replay Correctness) ──
    // Scheduled -> Started -> (Completed | Retrying* -> Failed | TimedOut | Stopped)
    /// Intent to run a step thunk or dispatch a remote invocation.
    InvokeScheduled {
        promise_id: PromiseId,
        kind: InvokeKind,
        name: String,
        input: Payload,
        retry_policy: Option<RetryPolicy>,
        semantics: Option<StepSemantics>,
    },
    /// Execution of the current attempt is in flight.
    InvokeStarted { promise_id: PromiseId, attempt: u32 },
    /// Result produced. Cached for replay.
    InvokeCompleted {
        promise_id: PromiseId,
        result: Payload,
        attempt: u32,
    },
    /// Transient failure, a retry has been scheduled.
    InvokeRetrying {
        promise_id: PromiseId,
        failed_attempt: u32,
        error: ExecutionError,
        retry_at: DateTime<Utc>,
    },
    /// Retries exhausted (Step), or local dispatch could not be completed (Invoke).
    InvokeFailed {
        promise_id: PromiseId,
        error: ExecutionError,
        attempt: u32,
    },
    /// Remote invocation exceeded its deadline (Invoke only).
    InvokeTimedOut { promise_id: PromiseId },
    /// Remote invocation was stopped by the remote system (Invoke only).
    InvokeStopped { promise_id: PromiseId },

    // ── Category 3: Nondeterminism (Determinism Guarantee) ──
    /// `ctx.random()` called. Value captured for deterministic replay.
    RandomGenerated {
        promise_id: PromiseId,
        value: Vec<u8>,
    },
    /// `ctx.now()` called. Wall-clock time captured for deterministic replay.
    TimeRecorded {
        promise_id: PromiseId,
        time: DateTime<Utc>,
    },

    // ── Category 4: Wait (Control Flow) ──
    /// `ctx.wait(duration)` called. Records both the requested duration and computed fire time.
    TimerScheduled {
        promise_id: PromiseId,
        duration: Duration,
        fire_at: DateTime<Utc>,
    },
    /// Timer duration elapsed. Resolves the timer's promise_id.
    TimerFired { promise_id: PromiseId },

    // ── Category 5: Callback (External Completion) ──
    /// `ctx.callback(name)` called. Mints a durable callback id exposed to the handler.
    CallbackScheduled {
        promise_id: PromiseId,
        callback_id: CallbackId,
        timeout: Duration,
        heartbeat_timeout: Option<Duration>,
    },
    /// External system reset the callback's expiry clock.
    CallbackHeartbeat { promise_id: PromiseId },
    /// External system completed the callback successfully.
    CallbackSucceeded {
        promise_id: PromiseId,
        payload: Payload,
    },
    /// External system reported failure.
    CallbackFailed {
        promise_id: PromiseId,
        error: ExecutionError,
    },
    /// Callback (or its last heartbeat) exceeded its timeout without resolution.
    CallbackTimedOut { promise_id: PromiseId },

    // ── Category 6: Suspension (State Reconstruction) ──
    /// Handler blocks on a single pending promise. Explicit suspend per IEEE 1849 (XES).
    ExecutionAwaiting { promise_id: PromiseId },
    /// Blocked → Running. Wait condition satisfied.
    ExecutionResumed,

    // ── Category 7: Context (Composition) ──
    /// A child context was started under this promise id.
    ContextStarted { promise_id: PromiseId, name: String },
    /// The child context's function returned Ok (terminal for this promise).
    ContextCompleted {
        promise_id: PromiseId,
        result: Payload,
    },
    /// The child context's function returned Err (terminal for this promise).
    ContextFailed {
        promise_id: PromiseId,
        error: ExecutionError,
    },
}

impl EventType {
    /// Returns the variant name as a static string for error messages and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecutionStarted { .. } => "ExecutionStarted",
            Self::ExecutionCompleted { .. } => "ExecutionCompleted",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::CancelRequested { .. } => "CancelRequested",
            Self::ExecutionCancelled { .. } => "ExecutionCancelled",
            Self::InvokeScheduled { .. } => "InvokeScheduled",
            Self::InvokeStarted { .. } => "InvokeStarted",
            Self::InvokeCompleted { .. } => "InvokeCompleted",
            Self::InvokeRetrying { .. } => "InvokeRetrying",
            Self::InvokeFailed { .. } => "InvokeFailed",
            Self::InvokeTimedOut { .. } => "InvokeTimedOut",
            Self::InvokeStopped { .. } => "InvokeStopped",
            Self::RandomGenerated { .. } => "RandomGenerated",
            Self::TimeRecorded { .. } => "TimeRecorded",
            Self::TimerScheduled { .. } => "TimerScheduled",
            Self::TimerFired { .. } => "TimerFired",
            Self::CallbackScheduled { .. } => "CallbackScheduled",
            Self::CallbackHeartbeat { .. } => "CallbackHeartbeat",
            Self::CallbackSucceeded { .. } => "CallbackSucceeded",
            Self::CallbackFailed { .. } => "CallbackFailed",
            Self::CallbackTimedOut { .. } => "CallbackTimedOut",
            Self::ExecutionAwaiting { .. } => "ExecutionAwaiting",
            Self::ExecutionResumed => "ExecutionResumed",
            Self::ContextStarted { .. } => "ContextStarted",
            Self::ContextCompleted { .. } => "ContextCompleted",
            Self::ContextFailed { .. } => "ContextFailed",
        }
    }

    /// Whether this event ends the execution (Completed, Failed, or Cancelled).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExecutionCompleted { .. }
                | Self::ExecutionFailed { .. }
                | Self::ExecutionCancelled { .. }
        )
    }
}
