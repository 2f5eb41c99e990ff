use chrono::{Duration, Utc};
use invariant_types::{DomainError, EventType};

use crate::ctx::Ctx;
use crate::error::RuntimeError;

/// Durable timer (§4.3.2). Rejects sub-second durations outright; the
/// timer fires only once a `TimerFired` event is delivered (by a later
/// invocation), never by locally busy-waiting on the wall clock.
pub fn run(ctx: &Ctx, duration: Duration) -> Result<(), RuntimeError> {
    super::reject_if_nested(ctx)?;
    if duration < Duration::seconds(1) {
        return Err(RuntimeError::IllegalDurableOperation(
            DomainError::SubSecondWait {
                millis: duration.num_milliseconds(),
            }
            .to_string(),
        ));
    }

    let promise_id = ctx.allocator.next().map_err(crate::ctx::domain_err)?;

    let already_fired = {
        let log = ctx.handle.log.lock().expect("log mutex poisoned");
        let events = log.events_for(&promise_id);
        if events.is_empty() {
            drop(log);
            ctx.handle.replay.mark_live();
            let mut log = ctx.handle.log.lock().expect("log mutex poisoned");
            log.apply(EventType::TimerScheduled {
                promise_id: promise_id.clone(),
                duration,
                fire_at: Utc::now() + duration,
            })?;
            false
        } else {
            events.iter().any(|e| matches!(e, EventType::TimerFired { .. }))
        }
    };

    if already_fired {
        return Ok(());
    }

    super::block_until(ctx, |log| {
        log.events_for(&promise_id)
            .iter()
            .any(|e| matches!(e, EventType::TimerFired { .. }))
    })
}
