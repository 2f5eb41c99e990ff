use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use invariant_types::{EventType, PromiseId};
use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{JsonCodec, ValueCodec};
use crate::error::RuntimeError;
use crate::id_allocator::{IdAllocator, ReplayCursor};
use crate::log::ExecutionLog;
use crate::operations;
use crate::operations::callback::Callback;
use crate::scheduler::Scheduler;
use crate::worker_pool::WorkerPool;

/// Everything shared across every `Ctx` in one execution: the root and every
/// child context hold an `Arc` to the same handle. Only the id allocator
/// (and the implicit OS thread) differ between contexts.
pub struct ExecutionHandle {
    pub(crate) log: Mutex<ExecutionLog>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) replay: ReplayCursor,
    pub(crate) codec: Arc<dyn ValueCodec + Send + Sync>,
    pub(crate) workers: Arc<WorkerPool>,
    pub(crate) log_during_replay: bool,
}

impl ExecutionHandle {
    /// Builds a handle with its own fresh worker pool and the default JSON
    /// codec. Convenient for tests and one-off executions;
    /// [`Executor`](crate::executor::Executor) uses
    /// [`ExecutionHandle::with_workers`] instead so the pool survives across
    /// invocations (§4.7) and the configured codec is honored.
    pub fn new(log: ExecutionLog, replay: ReplayCursor, worker_count: usize) -> Arc<Self> {
        Self::with_workers(
            log,
            replay,
            Arc::new(WorkerPool::new(worker_count)),
            Arc::new(JsonCodec),
            false,
        )
    }

    pub fn with_workers(
        log: ExecutionLog,
        replay: ReplayCursor,
        workers: Arc<WorkerPool>,
        codec: Arc<dyn ValueCodec + Send + Sync>,
        log_during_replay: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(log),
            scheduler: Scheduler::new(),
            replay,
            codec,
            workers,
            log_during_replay,
        })
    }

    /// Whether a `tracing` event should actually fire right now: suppressed
    /// while replaying unless `ExecutorConfig::log_during_replay(true)` was
    /// set (§5, §4.6).
    pub(crate) fn should_log(&self) -> bool {
        !self.replay.is_replaying() || self.log_during_replay
    }
}

/// The handler-facing API (§4.3, §4.6). One `Ctx` exists per context
/// (the root execution, or a nested child), each with its own id allocator
/// but sharing the same underlying log, scheduler and worker pool.
pub struct Ctx {
    pub(crate) handle: Arc<ExecutionHandle>,
    pub(crate) allocator: IdAllocator,
}

impl Ctx {
    pub fn new_root(handle: Arc<ExecutionHandle>, execution_id: PromiseId) -> Self {
        Self {
            handle,
            allocator: IdAllocator::new(execution_id),
        }
    }

    pub(crate) fn child(&self, context_id: PromiseId) -> Ctx {
        Ctx {
            handle: Arc::clone(&self.handle),
            allocator: IdAllocator::new(context_id),
        }
    }

    pub fn context_id(&self) -> &PromiseId {
        self.allocator.context_id()
    }

    pub fn is_replaying(&self) -> bool {
        self.handle.replay.is_replaying()
    }

    /// Checkpointed step: runs `thunk` on the worker pool, at least once per
    /// retry attempt, using the default retry policy.
    pub fn step<T, F>(&self, name: &str, thunk: F) -> Result<T, RuntimeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Result<T, invariant_types::ExecutionError> + Send + 'static,
    {
        operations::step::run(
            self,
            name,
            invariant_types::StepSemantics::AtLeastOncePerRetry,
            None,
            thunk,
        )
    }

    /// Checkpointed step with explicit semantics/retry policy.
    pub fn step_with<T, F>(
        &self,
        name: &str,
        semantics: invariant_types::StepSemantics,
        retry_policy: Option<invariant_types::RetryPolicy>,
        thunk: F,
    ) -> Result<T, RuntimeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Result<T, invariant_types::ExecutionError> + Send + 'static,
    {
        operations::step::run(self, name, semantics, retry_policy, thunk)
    }

    /// Durable timer. Rejects sub-second durations (§9).
    pub fn wait(&self, duration: chrono::Duration) -> Result<(), RuntimeError> {
        operations::wait::run(self, duration)
    }

    /// Schedules an externally-completed callback and returns its handle
    /// without blocking, so the handler can hand the callback id to an
    /// external system before suspending on [`Callback::get`].
    pub fn callback(
        &self,
        name: &str,
        timeout: chrono::Duration,
        heartbeat_timeout: Option<chrono::Duration>,
    ) -> Result<Callback, RuntimeError> {
        operations::callback::schedule(self, name, timeout, heartbeat_timeout)
    }

    /// Dispatches a named remote invocation and blocks until it resolves.
    pub fn invoke<T, I>(
        &self,
        name: &str,
        input: &I,
        retry_policy: Option<invariant_types::RetryPolicy>,
    ) -> Result<T, RuntimeError>
    where
        T: DeserializeOwned,
        I: Serialize,
    {
        operations::invoke::run(self, name, input, retry_policy)
    }

    /// Runs `f` as a named child context with its own id space, on a
    /// dedicated OS thread, returning its cached result on replay.
    pub fn context<T, F>(&self, name: &str, f: F) -> Result<T, RuntimeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(&Ctx) -> Result<T, RuntimeError> + Send + 'static,
    {
        operations::context::run(self, name, f)
    }

    /// Deterministic random value, captured on first execution and replayed
    /// verbatim thereafter.
    pub fn random(&self) -> Result<u64, RuntimeError> {
        let promise_id = self.allocator.next().map_err(domain_err)?;
        let mut log = self.handle.log.lock().expect("log mutex poisoned");
        let events = log.events_for(&promise_id);
        if let Some(EventType::RandomGenerated { value, .. }) = events.first() {
            let bytes: [u8; 8] = value.as_slice().try_into().map_err(|_| {
                RuntimeError::IllegalDurableOperation("corrupt RandomGenerated payload".into())
            })?;
            return Ok(u64::from_le_bytes(bytes));
        }
        self.handle.replay.mark_live();
        let value = rand::rng().next_u64();
        log.apply(EventType::RandomGenerated {
            promise_id,
            value: value.to_le_bytes().to_vec(),
        })?;
        Ok(value)
    }

    /// Deterministic wall-clock read, captured on first execution and
    /// replayed verbatim thereafter.
    pub fn now(&self) -> Result<DateTime<Utc>, RuntimeError> {
        let promise_id = self.allocator.next().map_err(domain_err)?;
        let mut log = self.handle.log.lock().expect("log mutex poisoned");
        let events = log.events_for(&promise_id);
        if let Some(EventType::TimeRecorded { time, .. }) = events.first() {
            return Ok(*time);
        }
        self.handle.replay.mark_live();
        let time = Utc::now();
        log.apply(EventType::TimeRecorded { promise_id, time })?;
        Ok(time)
    }
}

pub(crate) fn domain_err(e: invariant_types::error::DomainError) -> RuntimeError {
    RuntimeError::IllegalDurableOperation(e.to_string())
}
