//! Concrete scenario tests: replay hits, suspend/resume on wait, retry to
//! success, at-most-once interruption, callback resolution, and call-site
//! rename detected as non-determinism.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration as StdDuration;

use chrono::Duration;
use invariant_runtime::{
    CheckpointClient, Ctx, Executor, ExecutionOutcome, ExecutorConfig, JsonCodec, RuntimeError, ValueCodec,
};
use invariant_types::{ExecutionError, ErrorKind, EventType, JournalEntry, Payload, PromiseId, StepSemantics};

use support::InMemoryClient;

fn root_id(digest: &[u8], key: &str) -> PromiseId {
    PromiseId::promise_root(digest, key, None)
}

fn outcome(client: &Arc<InMemoryClient>, arn: &str, digest: Vec<u8>, key: &str, handler: impl FnOnce(&Ctx) -> Result<Payload, RuntimeError>) -> ExecutionOutcome {
    let executor = Executor::new(Arc::clone(client) as Arc<dyn CheckpointClient>, ExecutorConfig::new().worker_count(2));
    executor
        .execute(arn, digest, key, Payload::empty(), handler)
        .unwrap()
        .outcome
}

/// 1. Replay hit: a completed step is never re-run on a later invocation
/// against the same log.
#[test]
fn replay_hit_does_not_rerun_a_completed_step() {
    let client = InMemoryClient::new();
    let runs = Arc::new(AtomicU32::new(0));

    let runs_first = Arc::clone(&runs);
    let result = outcome(&client, "arn:replay", vec![1], "k1", move |ctx| {
        let value = ctx.step("s", move || {
            runs_first.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ExecutionError>("hello x".to_string())
        })?;
        JsonCodec.encode(&value).map_err(RuntimeError::Codec)
    });
    match result {
        ExecutionOutcome::Succeeded { result } => {
            let value: String = JsonCodec.decode(&result).unwrap();
            assert_eq!(value, "hello x");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let runs_second = Arc::clone(&runs);
    let result = outcome(&client, "arn:replay", vec![1], "k1", move |ctx| {
        let value = ctx.step("s", move || {
            runs_second.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ExecutionError>("hello x".to_string())
        })?;
        JsonCodec.encode(&value).map_err(RuntimeError::Codec)
    });
    match result {
        ExecutionOutcome::Succeeded { result } => {
            let value: String = JsonCodec.decode(&result).unwrap();
            assert_eq!(value, "hello x");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1, "step thunk must not re-run on replay");
}

/// 2. Suspend on wait: the handler suspends at the timer and resumes once an
/// external system delivers `TimerFired`.
#[test]
fn suspend_on_wait_resumes_once_the_timer_fires() {
    let client = InMemoryClient::new();
    let digest = vec![2];
    let key = "k2";

    let result = outcome(&client, "arn:wait", digest.clone(), key, |ctx| {
        ctx.step("before", || Ok::<_, ExecutionError>(()))?;
        ctx.wait(Duration::seconds(10))?;
        JsonCodec.encode(&"unreachable".to_string()).map_err(RuntimeError::Codec)
    });
    assert!(matches!(result, ExecutionOutcome::Pending));

    let wait_id = root_id(&digest, key).child(2).unwrap();
    let entries = client.snapshot();
    client
        .checkpoint(
            "arn:wait",
            &String::new(),
            vec![JournalEntry {
                sequence: entries.len() as u64,
                timestamp: chrono::Utc::now(),
                event: EventType::TimerFired { promise_id: wait_id },
            }],
        )
        .unwrap();

    let result = outcome(&client, "arn:wait", digest, key, |ctx| {
        ctx.step("before", || panic!("must not re-run a completed step"))?;
        ctx.wait(Duration::seconds(10))?;
        let after = ctx.step("after", || Ok::<_, ExecutionError>("done".to_string()))?;
        JsonCodec.encode(&after).map_err(RuntimeError::Codec)
    });
    match result {
        ExecutionOutcome::Succeeded { result } => {
            let value: String = JsonCodec.decode(&result).unwrap();
            assert_eq!(value, "done");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
}

/// 3. Retry then succeed: a step failing twice under an exponential policy
/// eventually succeeds, with each failed attempt observing the minimum
/// one-second retry delay before the next invocation re-attempts.
#[test]
fn retry_then_succeed_eventually_completes() {
    let client = InMemoryClient::new();
    let digest = vec![3];
    let key = "k3";
    let policy = invariant_types::RetryPolicy::exponential(
        3,
        Duration::seconds(1),
        Duration::seconds(10),
        2.0,
        invariant_types::JitterMode::None,
    )
    .unwrap();
    let attempts = Arc::new(AtomicU32::new(0));

    let make_handler = |attempts: Arc<AtomicU32>, policy: invariant_types::RetryPolicy| {
        move |ctx: &Ctx| {
            let value = ctx.step_with("flaky", StepSemantics::AtLeastOncePerRetry, Some(policy.clone()), move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ExecutionError::new(ErrorKind::Trap, "transient"))
                } else {
                    Ok("ok".to_string())
                }
            })?;
            JsonCodec.encode(&value).map_err(RuntimeError::Codec)
        }
    };

    assert!(matches!(
        outcome(&client, "arn:retry", digest.clone(), key, make_handler(Arc::clone(&attempts), policy.clone())),
        ExecutionOutcome::Pending
    ));
    std::thread::sleep(StdDuration::from_millis(1100));
    assert!(matches!(
        outcome(&client, "arn:retry", digest.clone(), key, make_handler(Arc::clone(&attempts), policy.clone())),
        ExecutionOutcome::Pending
    ));
    std::thread::sleep(StdDuration::from_millis(2100));
    let result = outcome(&client, "arn:retry", digest, key, make_handler(Arc::clone(&attempts), policy));
    match result {
        ExecutionOutcome::Succeeded { result } => {
            let value: String = JsonCodec.decode(&result).unwrap();
            assert_eq!(value, "ok");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// 4. At-most-once interruption: a crash after `STARTED` but before the
/// terminal event surfaces as `StepInterrupted`, letting the handler run a
/// compensating step instead of re-attempting the original one.
#[test]
fn at_most_once_interruption_runs_a_compensating_step() {
    let client = InMemoryClient::new();
    let digest = vec![4];
    let key = "k4";

    let mut log = invariant_runtime::ExecutionLog::seed(Vec::new()).unwrap();
    log.apply(EventType::ExecutionStarted {
        component_digest: digest.clone(),
        input: Payload::empty(),
        parent_id: None,
        idempotency_key: key.to_string(),
    })
    .unwrap();
    let charge_id = root_id(&digest, key).child(1).unwrap();
    log.apply(EventType::InvokeScheduled {
        promise_id: charge_id.clone(),
        kind: invariant_types::InvokeKind::Step,
        name: "charge".to_string(),
        input: Payload::empty(),
        retry_policy: None,
        semantics: Some(StepSemantics::AtMostOncePerRetry),
    })
    .unwrap();
    log.apply(EventType::InvokeStarted {
        promise_id: charge_id,
        attempt: 1,
    })
    .unwrap();
    client.checkpoint("arn:amo", &String::new(), log.all_entries().to_vec()).unwrap();

    let original_ran = Arc::new(AtomicU32::new(0));
    let original_ran_in_handler = Arc::clone(&original_ran);
    let result = outcome(&client, "arn:amo", digest, key, move |ctx| {
        let charged = ctx.step_with("charge", StepSemantics::AtMostOncePerRetry, None, move || {
            original_ran_in_handler.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ExecutionError>("charged".to_string())
        });
        let value = match charged {
            Err(RuntimeError::StepInterrupted) => {
                ctx.step("verify", || Ok::<_, ExecutionError>("verified".to_string()))?
            }
            other => other?,
        };
        JsonCodec.encode(&value).map_err(RuntimeError::Codec)
    });

    match result {
        ExecutionOutcome::Succeeded { result } => {
            let value: String = JsonCodec.decode(&result).unwrap();
            assert_eq!(value, "verified");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
    assert_eq!(original_ran.load(Ordering::SeqCst), 0, "the original thunk must not re-run");
}

/// 5. Callback success: the handler suspends exposing a callback id, then
/// resumes once an external system resolves it.
#[test]
fn callback_success_resumes_with_the_delivered_payload() {
    let client = InMemoryClient::new();
    let digest = vec![5];
    let key = "k5";

    let result = outcome(&client, "arn:cb", digest.clone(), key, |ctx| {
        let callback = ctx.callback("approve", Duration::hours(1), None)?;
        let payload = callback.get(ctx)?;
        Ok(payload)
    });
    assert!(matches!(result, ExecutionOutcome::Pending));

    let callback_id = root_id(&digest, key).child(1).unwrap();
    let entries = client.snapshot();
    client
        .checkpoint(
            "arn:cb",
            &String::new(),
            vec![JournalEntry {
                sequence: entries.len() as u64,
                timestamp: chrono::Utc::now(),
                event: EventType::CallbackSucceeded {
                    promise_id: callback_id,
                    payload: JsonCodec.encode(&"yes".to_string()).unwrap(),
                },
            }],
        )
        .unwrap();

    let result = outcome(&client, "arn:cb", digest, key, |ctx| {
        let callback = ctx.callback("approve", Duration::hours(1), None)?;
        callback.get(ctx)
    });
    match result {
        ExecutionOutcome::Succeeded { result } => {
            let value: String = JsonCodec.decode(&result).unwrap();
            assert_eq!(value, "yes");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
}

/// 6. Non-determinism detected: renaming a step at a call site whose log
/// already holds a different name fails the execution, and the error
/// mentions both names.
#[test]
fn renaming_a_step_call_site_fails_as_nondeterminism() {
    let client = InMemoryClient::new();
    let digest = vec![6];
    let key = "k6";

    let mut log = invariant_runtime::ExecutionLog::seed(Vec::new()).unwrap();
    log.apply(EventType::ExecutionStarted {
        component_digest: digest.clone(),
        input: Payload::empty(),
        parent_id: None,
        idempotency_key: key.to_string(),
    })
    .unwrap();
    let step_id = root_id(&digest, key).child(1).unwrap();
    log.apply(EventType::InvokeScheduled {
        promise_id: step_id.clone(),
        kind: invariant_types::InvokeKind::Step,
        name: "orig".to_string(),
        input: Payload::empty(),
        retry_policy: None,
        semantics: Some(StepSemantics::AtLeastOncePerRetry),
    })
    .unwrap();
    log.apply(EventType::InvokeCompleted {
        promise_id: step_id,
        result: JsonCodec.encode(&1u32).unwrap(),
        attempt: 1,
    })
    .unwrap();
    client.checkpoint("arn:nondet", &String::new(), log.all_entries().to_vec()).unwrap();

    let result = outcome(&client, "arn:nondet", digest, key, |ctx| {
        let value: u32 = ctx.step("renamed", || Ok::<_, ExecutionError>(1))?;
        JsonCodec.encode(&value).map_err(RuntimeError::Codec)
    });

    match result {
        ExecutionOutcome::Failed { error } => {
            assert!(error.message.contains("orig"));
            assert!(error.message.contains("renamed"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}
