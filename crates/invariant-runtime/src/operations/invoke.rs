use invariant_types::{EventType, InvokeKind, Payload, RetryPolicy};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ctx::Ctx;
use crate::error::RuntimeError;

/// Dispatches a named remote invocation and blocks until the host delivers
/// one of its terminal events (§4.3.4).
///
/// Unlike a `Step`, there is no local thunk: retry (if any) is driven by the
/// remote system and observed here only as further `InvokeStarted`/
/// `InvokeRetrying` events, never decided by this crate's retry engine.
pub fn run<T, I>(ctx: &Ctx, name: &str, input: &I, retry_policy: Option<RetryPolicy>) -> Result<T, RuntimeError>
where
    T: DeserializeOwned,
    I: Serialize,
{
    super::reject_if_nested(ctx)?;
    let promise_id = ctx.allocator.next().map_err(crate::ctx::domain_err)?;

    let existing = {
        let log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.events_for(&promise_id).into_iter().cloned().collect::<Vec<_>>()
    };

    if existing.is_empty() {
        ctx.handle.replay.mark_live();
        let payload = ctx.handle.codec.encode(input).map_err(RuntimeError::Codec)?;
        let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.apply(EventType::InvokeScheduled {
            promise_id: promise_id.clone(),
            kind: InvokeKind::Invoke,
            name: name.to_string(),
            input: payload,
            retry_policy,
            semantics: None,
        })?;
    } else {
        let recorded_name = existing
            .iter()
            .find_map(|e| match e {
                EventType::InvokeScheduled { name, .. } => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_default();
        super::check_determinism(&promise_id, "Invoke", &recorded_name, "Invoke", name)?;
    }

    super::block_until(ctx, |log| {
        log.events_for(&promise_id).iter().any(|e| {
            matches!(
                e,
                EventType::InvokeCompleted { .. }
                    | EventType::InvokeFailed { .. }
                    | EventType::InvokeTimedOut { .. }
                    | EventType::InvokeStopped { .. }
            )
        })
    })?;

    let log = ctx.handle.log.lock().expect("log mutex poisoned");
    let events = log.events_for(&promise_id);
    for event in events.iter().rev() {
        match event {
            EventType::InvokeCompleted { result, .. } => {
                return decode(ctx, result);
            }
            EventType::InvokeFailed { error, .. } => return Err(RuntimeError::InvokeFailed(error.clone())),
            EventType::InvokeTimedOut { .. } => return Err(RuntimeError::InvokeTimedOut),
            EventType::InvokeStopped { .. } => return Err(RuntimeError::InvokeStopped),
            _ => {}
        }
    }
    unreachable!("block_until guaranteed a terminal invoke event is present")
}

fn decode<T: DeserializeOwned>(ctx: &Ctx, result: &Payload) -> Result<T, RuntimeError> {
    ctx.handle.codec.decode(result).map_err(RuntimeError::Codec)
}
