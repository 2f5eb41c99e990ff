use invariant_types::{EventType, Payload};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::thread;

use crate::checkpoint_client::LIMIT;
use crate::ctx::Ctx;
use crate::error::RuntimeError;

/// Runs `f` as a named child context (§4.3.5, C10): its own id space, a
/// single parent-visible result, cached on replay once terminal.
///
/// A `ContextCompleted` result within [`LIMIT`] is trusted from the log
/// directly. An oversize one is re-run instead (§4.5 pt 2, §9): the child
/// function executes again and the freshly serialized bytes are compared
/// against what was persisted, raising `NonDeterministicExecution` on
/// divergence rather than trusting a cached value that may no longer be
/// reachable. Child functions must therefore be idempotent with respect to
/// any externally-visible side effects they perform directly (as opposed to
/// through a nested `step`, which is already cached on its own).
pub fn run<T, F>(ctx: &Ctx, name: &str, f: F) -> Result<T, RuntimeError>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce(&Ctx) -> Result<T, RuntimeError> + Send + 'static,
{
    super::reject_if_nested(ctx)?;
    let promise_id = ctx.allocator.next().map_err(crate::ctx::domain_err)?;

    let existing = {
        let log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.events_for(&promise_id).into_iter().cloned().collect::<Vec<_>>()
    };

    if existing.is_empty() {
        ctx.handle.replay.mark_live();
        let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.apply(EventType::ContextStarted {
            promise_id: promise_id.clone(),
            name: name.to_string(),
        })?;
    } else {
        let recorded_name = existing
            .iter()
            .find_map(|e| match e {
                EventType::ContextStarted { name, .. } => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_default();
        super::check_determinism(&promise_id, "Context", &recorded_name, "Context", name)?;

        for event in &existing {
            match event {
                EventType::ContextCompleted { result, .. } if result.len() <= LIMIT => {
                    return ctx.handle.codec.decode(result).map_err(RuntimeError::Codec);
                }
                EventType::ContextCompleted { result, .. } => {
                    let persisted = result.clone();
                    let child_ctx = ctx.child(promise_id.clone());
                    return reconstruct_oversize(ctx, &promise_id, child_ctx, f, persisted);
                }
                EventType::ContextFailed { error, .. } => {
                    return Err(RuntimeError::StepFailed(error.clone()));
                }
                _ => {}
            }
        }
    }

    let child_ctx = ctx.child(promise_id.clone());
    let result = run_on_context_thread(ctx, child_ctx, f);

    match result {
        Ok(value) => {
            let payload = ctx.handle.codec.encode(&value).map_err(RuntimeError::Codec)?;
            let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
            log.apply(EventType::ContextCompleted {
                promise_id,
                result: payload,
            })?;
            Ok(value)
        }
        Err(RuntimeError::SuspendExecution) => Err(RuntimeError::SuspendExecution),
        Err(other) => {
            let error = other.to_execution_error();
            let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
            log.apply(EventType::ContextFailed {
                promise_id,
                error,
            })?;
            Err(other)
        }
    }
}

/// Re-runs a child context whose persisted result was oversize and checks
/// that the freshly produced bytes match what was checkpointed before
/// (§4.5 pt 2, §9). Does not re-apply `ContextStarted`/`ContextCompleted`:
/// both are already on the log from the original run.
fn reconstruct_oversize<T, F>(
    ctx: &Ctx,
    promise_id: &invariant_types::PromiseId,
    child_ctx: Ctx,
    f: F,
    persisted: Payload,
) -> Result<T, RuntimeError>
where
    T: Serialize + Send + 'static,
    F: FnOnce(&Ctx) -> Result<T, RuntimeError> + Send + 'static,
{
    let fresh = run_on_context_thread(ctx, child_ctx, f)?;
    let fresh_payload = ctx.handle.codec.encode(&fresh).map_err(RuntimeError::Codec)?;
    if fresh_payload.bytes == persisted.bytes {
        return Ok(fresh);
    }
    Err(RuntimeError::NonDeterministicExecution {
        promise_id: promise_id.clone(),
        expected_kind: "Context",
        expected_name: format!("cached oversize result ({} bytes)", persisted.len()),
        actual_kind: "Context",
        actual_name: format!("recomputed result ({} bytes)", fresh_payload.len()),
    })
}

/// Runs the child function on a dedicated OS thread (one per `Context`,
/// §4.6), counting it as runnable work so a parked sibling can keep waiting
/// rather than immediately requesting a whole-execution suspend.
fn run_on_context_thread<T, F>(ctx: &Ctx, child_ctx: Ctx, f: F) -> Result<T, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce(&Ctx) -> Result<T, RuntimeError> + Send + 'static,
{
    let scheduler = Arc::clone(&ctx.handle.scheduler);
    scheduler.enter_runnable();
    let handle = thread::spawn(move || f(&child_ctx));
    let outcome = handle.join();
    scheduler.exit_runnable();

    match outcome {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::IllegalDurableOperation("child context panicked".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::ExecutionHandle;
    use crate::id_allocator::ReplayCursor;
    use crate::log::ExecutionLog;
    use invariant_types::{Codec, ExecutionError, Payload, PromiseId};

    fn root_ctx() -> Ctx {
        let mut log = ExecutionLog::seed(Vec::new()).unwrap();
        log.apply(EventType::ExecutionStarted {
            component_digest: vec![1],
            input: Payload::new(vec![], Codec::Json),
            parent_id: None,
            idempotency_key: "k".into(),
        })
        .unwrap();
        let handle = ExecutionHandle::new(log, ReplayCursor::new(false), 2);
        Ctx::new_root(handle, PromiseId::new([8u8; 32]))
    }

    #[test]
    fn a_child_context_runs_and_is_cached_on_replay() {
        let ctx = root_ctx();
        let value = ctx
            .context("billing", |child| child.step("charge", || Ok::<_, ExecutionError>(99)))
            .unwrap();
        assert_eq!(value, 99);

        let entries = ctx.handle.log.lock().unwrap().all_entries().to_vec();
        let replay_log = ExecutionLog::seed(entries).unwrap();
        let replay_handle = ExecutionHandle::new(replay_log, ReplayCursor::new(true), 2);
        let replay_ctx = Ctx::new_root(replay_handle, PromiseId::new([8u8; 32]));

        let replayed = replay_ctx
            .context("billing", |_child| panic!("must not re-run a cached context"))
            .unwrap();
        assert_eq!(replayed, 99);
    }

    #[test]
    fn a_failing_child_context_surfaces_as_context_failed() {
        let ctx = root_ctx();
        let result = ctx.context::<(), _>("billing", |_child| {
            Err(RuntimeError::IllegalDurableOperation("denied".into()))
        });
        assert!(result.is_err());

        let promise_id = PromiseId::new([8u8; 32]).child(1).unwrap();
        let log = ctx.handle.log.lock().unwrap();
        let events = log.events_for(&promise_id);
        assert!(events.iter().any(|e| matches!(e, EventType::ContextFailed { .. })));
    }

    #[test]
    fn an_oversize_context_result_is_reconstructed_on_replay() {
        let ctx = root_ctx();
        let value = ctx
            .context("archive", |_child| Ok::<_, RuntimeError>(vec![7u8; LIMIT + 1]))
            .unwrap();
        assert_eq!(value.len(), LIMIT + 1);

        let entries = ctx.handle.log.lock().unwrap().all_entries().to_vec();
        let replay_log = ExecutionLog::seed(entries).unwrap();
        let replay_handle = ExecutionHandle::new(replay_log, ReplayCursor::new(true), 2);
        let replay_ctx = Ctx::new_root(replay_handle, PromiseId::new([8u8; 32]));

        let replayed = replay_ctx
            .context("archive", |_child| Ok::<_, RuntimeError>(vec![7u8; LIMIT + 1]))
            .unwrap();
        assert_eq!(replayed, value);
    }

    #[test]
    fn an_oversize_context_replay_divergence_is_nondeterministic() {
        let ctx = root_ctx();
        ctx.context("archive", |_child| Ok::<_, RuntimeError>(vec![7u8; LIMIT + 1]))
            .unwrap();

        let entries = ctx.handle.log.lock().unwrap().all_entries().to_vec();
        let replay_log = ExecutionLog::seed(entries).unwrap();
        let replay_handle = ExecutionHandle::new(replay_log, ReplayCursor::new(true), 2);
        let replay_ctx = Ctx::new_root(replay_handle, PromiseId::new([8u8; 32]));

        let result = replay_ctx.context("archive", |_child| Ok::<_, RuntimeError>(vec![8u8; LIMIT + 1]));
        assert!(matches!(result, Err(RuntimeError::NonDeterministicExecution { .. })));
    }
}
