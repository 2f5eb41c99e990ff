use std::sync::{Arc, Mutex};

use chrono::Utc;
use invariant_types::{EventType, ExecutionError, InvokeKind, PromiseId, RetryDecision, RetryPolicy, StepSemantics};

use crate::ctx::{Ctx, domain_err};
use crate::error::RuntimeError;
use crate::scheduler::with_step_role;

/// Runs a checkpointed step (§4.3.1).
///
/// Dispatches `thunk` to the worker pool at most once per call (a fresh
/// `thunk` only ever exists within a single invocation); retries across
/// invocations happen because the handler calls `step`/`step_with` again
/// with a freshly-constructed closure on the next replay.
pub fn run<T, F>(
    ctx: &Ctx,
    name: &str,
    semantics: StepSemantics,
    retry_policy: Option<RetryPolicy>,
    thunk: F,
) -> Result<T, RuntimeError>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
    F: FnOnce() -> Result<T, ExecutionError> + Send + 'static,
{
    super::reject_if_nested(ctx)?;
    let promise_id = ctx.allocator.next().map_err(domain_err)?;
    let policy = retry_policy.unwrap_or_else(RetryPolicy::default_policy);

    let existing = {
        let log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.events_for(&promise_id).into_iter().cloned().collect::<Vec<_>>()
    };

    if existing.is_empty() {
        ctx.handle.replay.mark_live();
        {
            let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
            log.apply(EventType::InvokeScheduled {
                promise_id: promise_id.clone(),
                kind: InvokeKind::Step,
                name: name.to_string(),
                input: invariant_types::Payload::empty(),
                retry_policy: Some(policy.clone()),
                semantics: Some(semantics),
            })?;
            log.apply(EventType::InvokeStarted {
                promise_id: promise_id.clone(),
                attempt: 1,
            })?;
        }
        return execute_attempt(ctx, promise_id, 1, &policy, thunk);
    }

    super::check_determinism(&promise_id, "Step", &scheduled_name(&existing), "Step", name)?;

    if let Some(result) = terminal_result::<T>(ctx, &promise_id, &existing)? {
        return result;
    }

    match latest_retry_or_start(&existing) {
        Latest::Retrying { failed_attempt, retry_at } => {
            if Utc::now() < retry_at {
                return super::block_until(ctx, |_| false).map(|_| unreachable!());
            }
            let attempt = failed_attempt + 1;
            ctx.handle.replay.mark_live();
            {
                let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
                log.apply(EventType::InvokeStarted {
                    promise_id: promise_id.clone(),
                    attempt,
                })?;
            }
            execute_attempt(ctx, promise_id, attempt, &policy, thunk)
        }
        Latest::StartedWithoutTerminal { attempt } => match semantics {
            StepSemantics::AtMostOncePerRetry => Err(RuntimeError::StepInterrupted),
            StepSemantics::AtLeastOncePerRetry => {
                let next_attempt = attempt + 1;
                ctx.handle.replay.mark_live();
                {
                    let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
                    log.apply(EventType::InvokeStarted {
                        promise_id: promise_id.clone(),
                        attempt: next_attempt,
                    })?;
                }
                execute_attempt(ctx, promise_id, next_attempt, &policy, thunk)
            }
        },
    }
}

fn scheduled_name(events: &[EventType]) -> String {
    events
        .iter()
        .find_map(|e| match e {
            EventType::InvokeScheduled { name, .. } => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn terminal_result<T>(
    ctx: &Ctx,
    promise_id: &PromiseId,
    events: &[EventType],
) -> Result<Option<Result<T, RuntimeError>>, RuntimeError>
where
    T: serde::de::DeserializeOwned,
{
    for event in events {
        match event {
            EventType::InvokeCompleted { result, .. } => {
                let value = ctx.handle.codec.decode(result).map_err(RuntimeError::Codec)?;
                return Ok(Some(Ok(value)));
            }
            EventType::InvokeFailed { error, .. } => {
                return Ok(Some(Err(RuntimeError::StepFailed(error.clone()))));
            }
            _ => {}
        }
    }
    let _ = promise_id;
    Ok(None)
}

enum Latest {
    Retrying {
        failed_attempt: u32,
        retry_at: chrono::DateTime<Utc>,
    },
    StartedWithoutTerminal {
        attempt: u32,
    },
}

fn latest_retry_or_start(events: &[EventType]) -> Latest {
    for event in events.iter().rev() {
        match event {
            EventType::InvokeRetrying {
                failed_attempt,
                retry_at,
                ..
            } => {
                return Latest::Retrying {
                    failed_attempt: *failed_attempt,
                    retry_at: *retry_at,
                };
            }
            EventType::InvokeStarted { attempt, .. } => {
                return Latest::StartedWithoutTerminal { attempt: *attempt };
            }
            _ => {}
        }
    }
    Latest::StartedWithoutTerminal { attempt: 0 }
}

fn execute_attempt<T, F>(
    ctx: &Ctx,
    promise_id: PromiseId,
    attempt: u32,
    policy: &RetryPolicy,
    thunk: F,
) -> Result<T, RuntimeError>
where
    T: serde::Serialize + Send + 'static,
    F: FnOnce() -> Result<T, ExecutionError> + Send + 'static,
{
    let outcome = run_on_worker(ctx, promise_id.clone(), attempt, thunk)?;
    match outcome {
        Ok(value) => {
            let payload = ctx.handle.codec.encode(&value).map_err(RuntimeError::Codec)?;
            let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
            log.apply(EventType::InvokeCompleted {
                promise_id,
                result: payload,
                attempt,
            })?;
            Ok(value)
        }
        Err(error) => match policy.decide(&error, attempt) {
            RetryDecision::Retry { delay } => {
                let retry_at = Utc::now() + delay;
                {
                    let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
                    log.apply(EventType::InvokeRetrying {
                        promise_id,
                        failed_attempt: attempt,
                        error,
                        retry_at,
                    })?;
                }
                super::block_until(ctx, |_| false)?;
                unreachable!("block_until(|_| false) only ever returns Err(SuspendExecution)")
            }
            RetryDecision::Fail => {
                {
                    let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
                    log.apply(EventType::InvokeFailed {
                        promise_id,
                        error: error.clone(),
                        attempt,
                    })?;
                }
                Err(RuntimeError::StepFailed(error))
            }
        },
    }
}

/// Dispatches `thunk` to the worker pool and blocks the calling logical
/// thread for its result, counting the worker as runnable so sibling
/// contexts may still make progress while it executes.
fn run_on_worker<T, F>(
    ctx: &Ctx,
    promise_id: PromiseId,
    attempt: u32,
    thunk: F,
) -> Result<Result<T, ExecutionError>, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ExecutionError> + Send + 'static,
{
    let slot: Arc<Mutex<Option<Result<T, ExecutionError>>>> = Arc::new(Mutex::new(None));
    let slot_writer = Arc::clone(&slot);
    let scheduler = Arc::clone(&ctx.handle.scheduler);
    let scheduler_for_job = Arc::clone(&scheduler);

    scheduler.enter_runnable();
    ctx.handle.workers.spawn(move || {
        let result = with_step_role(promise_id, attempt, thunk);
        *slot_writer.lock().expect("step result slot poisoned") = Some(result);
        scheduler_for_job.exit_runnable();
    });

    let resolved = scheduler.wait_until(|| slot.lock().expect("step result slot poisoned").is_some());
    if !resolved {
        return Err(RuntimeError::SuspendExecution);
    }
    Ok(slot
        .lock()
        .expect("step result slot poisoned")
        .take()
        .expect("slot marked done without a value"))
}
