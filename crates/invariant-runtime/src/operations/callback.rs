use chrono::Duration;
use invariant_types::{CallbackId, EventType, Payload, PromiseId};
use tracing::debug;
use uuid::Uuid;

use crate::ctx::Ctx;
use crate::error::RuntimeError;

/// A scheduled external-completion callback (§4.3.3).
///
/// Returned immediately by [`Ctx::callback`] without blocking, so the
/// handler can hand `id` to an external system before calling [`Callback::get`]
/// to suspend until it resolves.
pub struct Callback {
    promise_id: PromiseId,
    pub id: CallbackId,
}

pub fn schedule(
    ctx: &Ctx,
    name: &str,
    timeout: Duration,
    heartbeat_timeout: Option<Duration>,
) -> Result<Callback, RuntimeError> {
    super::reject_if_nested(ctx)?;
    let promise_id = ctx.allocator.next().map_err(crate::ctx::domain_err)?;

    let existing = {
        let log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.events_for(&promise_id).into_iter().cloned().collect::<Vec<_>>()
    };

    let id = if let Some(id) = existing.iter().find_map(|e| match e {
        EventType::CallbackScheduled { callback_id, .. } => Some(callback_id.clone()),
        _ => None,
    }) {
        id
    } else {
        ctx.handle.replay.mark_live();
        let id = Uuid::new_v4().to_string();
        if ctx.handle.should_log() {
            debug!(callback = name, id = %id, "scheduling callback");
        }
        let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
        log.apply(EventType::CallbackScheduled {
            promise_id: promise_id.clone(),
            callback_id: id.clone(),
            timeout,
            heartbeat_timeout,
        })?;
        id
    };

    Ok(Callback { promise_id, id })
}

impl Callback {
    /// Blocks until an external system resolves this callback.
    pub fn get(&self, ctx: &Ctx) -> Result<Payload, RuntimeError> {
        super::reject_if_nested(ctx)?;
        let promise_id = self.promise_id.clone();
        super::block_until(ctx, |log| {
            log.events_for(&promise_id).iter().any(|e| {
                matches!(
                    e,
                    EventType::CallbackSucceeded { .. }
                        | EventType::CallbackFailed { .. }
                        | EventType::CallbackTimedOut { .. }
                )
            })
        })?;

        let log = ctx.handle.log.lock().expect("log mutex poisoned");
        let events = log.events_for(&promise_id);
        for event in events.iter().rev() {
            match event {
                EventType::CallbackSucceeded { payload, .. } => return Ok(payload.clone()),
                EventType::CallbackFailed { error, .. } => {
                    return Err(RuntimeError::CallbackFailed(error.clone()));
                }
                EventType::CallbackTimedOut { .. } => return Err(RuntimeError::CallbackTimeout),
                _ => {}
            }
        }
        unreachable!("block_until guaranteed a terminal callback event is present")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::ExecutionHandle;
    use crate::id_allocator::ReplayCursor;
    use crate::log::ExecutionLog;
    use invariant_types::{Codec, ExecutionError, ErrorKind};

    fn root_ctx() -> Ctx {
        let mut log = ExecutionLog::seed(Vec::new()).unwrap();
        log.apply(EventType::ExecutionStarted {
            component_digest: vec![1],
            input: Payload::new(vec![], Codec::Json),
            parent_id: None,
            idempotency_key: "k".into(),
        })
        .unwrap();
        let handle = ExecutionHandle::new(log, ReplayCursor::new(false), 1);
        Ctx::new_root(handle, PromiseId::new([5u8; 32]))
    }

    #[test]
    fn scheduling_mints_a_callback_id_without_blocking() {
        let ctx = root_ctx();
        let callback = ctx
            .callback("approval", Duration::hours(1), None)
            .expect("schedule should not block");
        assert!(!callback.id.is_empty());
    }

    #[test]
    fn get_suspends_until_resolved() {
        let ctx = root_ctx();
        let callback = ctx.callback("approval", Duration::hours(1), None).unwrap();
        assert!(matches!(callback.get(&ctx), Err(RuntimeError::SuspendExecution)));
    }

    #[test]
    fn get_returns_the_payload_once_succeeded() {
        let ctx = root_ctx();
        let callback = ctx.callback("approval", Duration::hours(1), None).unwrap();
        {
            let mut log = ctx.handle.log.lock().unwrap();
            log.apply(EventType::CallbackSucceeded {
                promise_id: PromiseId::new([5u8; 32]).child(1).unwrap(),
                payload: Payload::new(vec![1, 2, 3], Codec::Json),
            })
            .unwrap();
        }
        let payload = callback.get(&ctx).unwrap();
        assert_eq!(payload.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn get_maps_failure_and_timeout() {
        let ctx = root_ctx();
        let callback = ctx.callback("approval", Duration::hours(1), None).unwrap();
        {
            let mut log = ctx.handle.log.lock().unwrap();
            log.apply(EventType::CallbackFailed {
                promise_id: PromiseId::new([5u8; 32]).child(1).unwrap(),
                error: ExecutionError::new(ErrorKind::UserError, "denied"),
            })
            .unwrap();
        }
        assert!(matches!(callback.get(&ctx), Err(RuntimeError::CallbackFailed(_))));
    }
}
