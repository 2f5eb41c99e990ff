use std::sync::Arc;

use invariant_types::{EventType, ExecutionError, Payload, PromiseId};

use crate::checkpoint_client::{CheckpointClient, CheckpointToken, LIMIT};
use crate::codec::{JsonCodec, ValueCodec};
use crate::coordinator::CheckpointCoordinator;
use crate::ctx::{Ctx, ExecutionHandle};
use crate::error::RuntimeError;
use crate::id_allocator::ReplayCursor;
use crate::log::ExecutionLog;
use crate::worker_pool::WorkerPool;

/// Tunables for one [`Executor`] (C9).
#[derive(Clone)]
pub struct ExecutorConfig {
    codec: Arc<dyn ValueCodec + Send + Sync>,
    worker_count: usize,
    log_during_replay: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            worker_count: 4,
            log_during_replay: false,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codec(mut self, codec: Arc<dyn ValueCodec + Send + Sync>) -> Self {
        self.codec = codec;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Whether `tracing` events are emitted while `ReplayCursor::is_replaying`
    /// is still true. Off by default, matching §4.6's "suppressed during
    /// replay unless explicitly enabled" note.
    pub fn log_during_replay(mut self, enabled: bool) -> Self {
        self.log_during_replay = enabled;
        self
    }

    pub fn emits_during_replay(&self) -> bool {
        self.log_during_replay
    }
}

/// The final disposition of one invocation (§4.7 step 4).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Succeeded { result: Payload },
    Failed { error: ExecutionError },
    /// The handler suspended on an outstanding operation. No `EXECUTION`
    /// terminal event is written; a later invocation resumes from the
    /// checkpointed state.
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub outcome: ExecutionOutcome,
    pub checkpoint_token: CheckpointToken,
}

/// Wraps one host invocation end to end (C9): seeds the log from the
/// checkpoint client, runs the handler, classifies the result, and flushes
/// whatever the run produced.
///
/// A single `Executor` owns one worker pool for its whole process lifetime
/// (§4.7): it is meant to be constructed once per configured SDK instance
/// and reused across invocations, never torn down as a side effect of a
/// single `execute()` call.
pub struct Executor {
    client: Arc<dyn CheckpointClient>,
    config: ExecutorConfig,
    workers: Arc<WorkerPool>,
}

impl Executor {
    pub fn new(client: Arc<dyn CheckpointClient>, config: ExecutorConfig) -> Self {
        let workers = Arc::new(WorkerPool::new(config.worker_count));
        Self { client, config, workers }
    }

    pub fn execute<H>(
        &self,
        arn: &str,
        component_digest: Vec<u8>,
        idempotency_key: &str,
        input: Payload,
        handler: H,
    ) -> Result<ExecutionOutput, RuntimeError>
    where
        H: FnOnce(&Ctx) -> Result<Payload, RuntimeError>,
    {
        let entries = self.fetch_all_state(arn)?;
        let replaying = !entries.is_empty();

        // A later invocation against an already-terminal execution reconstructs
        // its outcome straight from the journal instead of re-running the
        // handler: the full payload always lives in the `ExecutionCompleted`
        // event even when the first invocation's inline response was emptied
        // out for being oversize (§4.5 pt 2, §8, §9).
        if let Some(outcome) = entries.iter().find_map(|e| match &e.event {
            EventType::ExecutionCompleted { result } => Some(ExecutionOutcome::Succeeded { result: result.clone() }),
            EventType::ExecutionFailed { error } => Some(ExecutionOutcome::Failed { error: error.clone() }),
            _ => None,
        }) {
            return Ok(ExecutionOutput {
                outcome,
                checkpoint_token: CheckpointToken::new(),
            });
        }

        let execution_id = match entries.first() {
            Some(invariant_types::JournalEntry {
                event:
                    EventType::ExecutionStarted {
                        component_digest: digest,
                        idempotency_key: key,
                        parent_id,
                        ..
                    },
                ..
            }) => PromiseId::promise_root(digest, key, parent_id.as_ref()),
            Some(_) => {
                return Err(RuntimeError::IllegalDurableOperation(
                    "seeded journal does not start with ExecutionStarted".into(),
                ));
            }
            None => PromiseId::promise_root(&component_digest, idempotency_key, None),
        };

        let mut log = ExecutionLog::seed(entries)?;
        if !replaying {
            log.apply(EventType::ExecutionStarted {
                component_digest,
                input,
                parent_id: None,
                idempotency_key: idempotency_key.to_string(),
            })?;
        }

        let replay_cursor = ReplayCursor::new(replaying);
        let should_log = !replaying || self.config.emits_during_replay();
        let handle = ExecutionHandle::with_workers(
            log,
            replay_cursor.clone(),
            Arc::clone(&self.workers),
            Arc::clone(&self.config.codec),
            self.config.emits_during_replay(),
        );
        let ctx = Ctx::new_root(Arc::clone(&handle), execution_id);

        let result = handler(&ctx);

        let outcome = {
            let mut log = handle.log.lock().expect("log mutex poisoned");
            match result {
                Ok(result) => {
                    log.apply(EventType::ExecutionCompleted { result: result.clone() })?;
                    // The inline response stays small even when the durable
                    // result is not: a full-size payload still lands in the
                    // journal above, but the host only gets it back once it
                    // asks again on a later, already-terminal invocation.
                    let inline = if result.len() > LIMIT { Payload::empty() } else { result };
                    ExecutionOutcome::Succeeded { result: inline }
                }
                Err(RuntimeError::SuspendExecution) => ExecutionOutcome::Pending,
                Err(other) => {
                    let error = other.to_execution_error();
                    log.apply(EventType::ExecutionFailed { error: error.clone() })?;
                    ExecutionOutcome::Failed { error }
                }
            }
        };

        let coordinator = CheckpointCoordinator::new(Arc::clone(&self.client), arn.to_string(), CheckpointToken::new());
        let mut log = handle.log.lock().expect("log mutex poisoned");
        coordinator.flush(&mut log, should_log)?;

        Ok(ExecutionOutput {
            outcome,
            checkpoint_token: CheckpointToken::new(),
        })
    }

    fn fetch_all_state(&self, arn: &str) -> Result<Vec<invariant_types::JournalEntry>, RuntimeError> {
        let mut entries = Vec::new();
        let mut marker = None;
        loop {
            let (page, next) = self.client.get_state(arn, marker.as_deref())?;
            entries.extend(page);
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(entries)
    }
}
