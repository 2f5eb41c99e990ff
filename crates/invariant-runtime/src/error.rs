use invariant_types::{ExecutionError, PromiseId};

/// Errors a handler sees from an operation's `get()`, or that terminate an
/// execution outright.
///
/// This workspace has no exception mechanism: a handler's signature is
/// `fn(&Ctx, Input) -> Result<Output, RuntimeError>`, and every operation's
/// `get()` returns this same sum type. `SuspendExecution` is the one variant
/// user code never constructs or matches on meaningfully -- it is caught
/// exclusively by the executor (see `scheduler`).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("step failed: {0}")]
    StepFailed(ExecutionError),

    #[error("step interrupted: checkpoint was lost mid-execution")]
    StepInterrupted,

    #[error("callback failed: {0}")]
    CallbackFailed(ExecutionError),

    #[error("callback timed out")]
    CallbackTimeout,

    #[error("invoke failed: {0}")]
    InvokeFailed(ExecutionError),

    #[error("invoke timed out")]
    InvokeTimedOut,

    #[error("invoke stopped by remote system")]
    InvokeStopped,

    #[error(
        "non-deterministic execution: operation {promise_id} expected {expected_kind}/{expected_name}, got {actual_kind}/{actual_name}"
    )]
    NonDeterministicExecution {
        promise_id: PromiseId,
        expected_kind: &'static str,
        expected_name: String,
        actual_kind: &'static str,
        actual_name: String,
    },

    #[error("illegal durable operation: {0}")]
    IllegalDurableOperation(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("journal violation: {0}")]
    Journal(#[from] invariant_journal::JournalViolation),

    /// Internal-only sentinel. Propagated by every intermediate `get()` via
    /// `?` up to the executor, which is the only place that ever matches on
    /// it; never surfaced to a host invocation's `error` field.
    #[error("execution suspended")]
    SuspendExecution,
}

/// Errors from encoding/decoding a value through a [`crate::codec::Codec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported codec: {0:?}")]
    UnsupportedCodec(invariant_types::Codec),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// Errors surfaced by a [`crate::checkpoint_client::CheckpointClient`].
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint token is stale")]
    StaleToken,
    #[error("checkpoint state conflict: {0}")]
    StateConflict(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl RuntimeError {
    /// Coarse projection onto the journal's `ExecutionError` shape, used
    /// when a context or the top-level execution must record a terminal
    /// failure event for an error that did not already carry one.
    pub fn to_execution_error(&self) -> ExecutionError {
        match self {
            Self::StepFailed(e) | Self::CallbackFailed(e) | Self::InvokeFailed(e) => e.clone(),
            Self::CallbackTimeout | Self::InvokeTimedOut => {
                ExecutionError::new(invariant_types::ErrorKind::Timeout, self.to_string())
            }
            Self::InvokeStopped => ExecutionError::new(invariant_types::ErrorKind::Cancelled, self.to_string()),
            other => ExecutionError::new(invariant_types::ErrorKind::Uncategorized, other.to_string()),
        }
    }
}

impl CheckpointError {
    /// Hard protocol errors are fatal; anything else is a retriable suspension
    /// per §4.5 point 3.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StaleToken | Self::StateConflict(_))
    }
}
