pub mod callback;
pub mod context;
pub mod invoke;
pub mod step;
pub mod wait;

use invariant_types::{ErrorKind, EventType, ExecutionError, PromiseId};

use crate::ctx::Ctx;
use crate::error::RuntimeError;
use crate::log::ExecutionLog;
use crate::scheduler::{ThreadRole, current_role, current_step};

/// Rejects a durable operation issued from inside a step thunk (§4.6, §7): a
/// thunk runs on a worker thread and must only return a plain value, never
/// call another `get()`. Checkpoints the enclosing step as `InvokeFailed` so
/// the violation is durable and terminates the execution rather than being
/// silently absorbed by the nested call's own retry logic.
pub(crate) fn reject_if_nested(ctx: &Ctx) -> Result<(), RuntimeError> {
    if current_role() != ThreadRole::Step {
        return Ok(());
    }
    let error = ExecutionError::new(
        ErrorKind::Trap,
        "illegal durable operation: nested get() called from inside a step thunk",
    );
    if let Some((step_id, attempt)) = current_step() {
        let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.apply(EventType::InvokeFailed {
            promise_id: step_id,
            error: error.clone(),
            attempt,
        })?;
    }
    Err(RuntimeError::IllegalDurableOperation(error.message))
}

/// Block the calling logical thread until `is_done` holds against the
/// current log state, or until no other logical thread/worker in this
/// execution can make forward progress, in which case this returns
/// `Err(RuntimeError::SuspendExecution)` (§4.6 suspension points).
pub(crate) fn block_until(ctx: &Ctx, is_done: impl Fn(&ExecutionLog) -> bool) -> Result<(), RuntimeError> {
    let resolved = ctx
        .handle
        .scheduler
        .wait_until(|| is_done(&ctx.handle.log.lock().expect("log mutex poisoned")));
    if resolved {
        Ok(())
    } else {
        Err(RuntimeError::SuspendExecution)
    }
}

/// Compares what a call site recorded in an earlier run against what the
/// handler is requesting now, surfacing a divergence as
/// `RuntimeError::NonDeterministicExecution` rather than silently replaying
/// the wrong operation.
pub(crate) fn check_determinism(
    promise_id: &PromiseId,
    recorded_kind: &'static str,
    recorded_name: &str,
    requested_kind: &'static str,
    requested_name: &str,
) -> Result<(), RuntimeError> {
    if recorded_kind != requested_kind || recorded_name != requested_name {
        return Err(RuntimeError::NonDeterministicExecution {
            promise_id: promise_id.clone(),
            expected_kind: recorded_kind,
            expected_name: recorded_name.to_string(),
            actual_kind: requested_kind,
            actual_name: requested_name.to_string(),
        });
    }
    Ok(())
}
