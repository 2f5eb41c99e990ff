use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use invariant_types::{EventType, JournalEntry};
use tracing::debug;

use crate::checkpoint_client::{CheckpointClient, CheckpointToken, LIMIT, estimate_batch_size};
use crate::error::CheckpointError;
use crate::log::ExecutionLog;

/// Batches outstanding journal updates and drives them through a
/// [`CheckpointClient`] (C7).
///
/// Holds the current checkpoint token behind a `Mutex` so `flush` and
/// `flush_async` can both safely advance it; in practice only one flush is
/// ever in flight per execution because the cooperative scheduler only lets
/// one logical thread run at a time (§4.6).
pub struct CheckpointCoordinator {
    client: Arc<dyn CheckpointClient>,
    arn: String,
    token: Mutex<CheckpointToken>,
}

impl CheckpointCoordinator {
    pub fn new(client: Arc<dyn CheckpointClient>, arn: String, initial_token: CheckpointToken) -> Self {
        Self {
            client,
            arn,
            token: Mutex::new(initial_token),
        }
    }

    /// Blocking flush: drains `log`'s pending updates and checkpoints them.
    /// A no-op when there is nothing pending. `log_enabled` gates the
    /// per-batch `tracing` event, suppressed during replay unless the
    /// executor was configured to emit logs then too (§5, §4.6).
    pub fn flush(&self, log: &mut ExecutionLog, log_enabled: bool) -> Result<(), CheckpointError> {
        let pending = log.take_pending();
        self.flush_batch(pending, log_enabled)
    }

    /// Spawns the same blocking checkpoint call on a dedicated I/O thread so
    /// the context thread can keep running other work. Returns a join handle
    /// carrying the eventual result; the caller decides when (or whether) to
    /// wait on it.
    pub fn flush_async(
        self: &Arc<Self>,
        log: &mut ExecutionLog,
        log_enabled: bool,
    ) -> JoinHandle<Result<(), CheckpointError>> {
        let pending = log.take_pending();
        let this = Arc::clone(self);
        thread::spawn(move || this.flush_batch(pending, log_enabled))
    }

    fn flush_batch(&self, updates: Vec<JournalEntry>, log_enabled: bool) -> Result<(), CheckpointError> {
        if updates.is_empty() {
            return Ok(());
        }
        for batch in split_oversize(updates) {
            if log_enabled {
                debug!(batch_len = batch.len(), "checkpointing batch");
            }
            let mut token = self.token.lock().expect("checkpoint token mutex poisoned");
            let (new_token, _state) = self.client.checkpoint(&self.arn, &token, batch)?;
            *token = new_token;
        }
        Ok(())
    }
}

/// Splits `updates` so that any individually oversize terminal payload
/// travels alone, and the rest are grouped into sub-batches whose aggregate
/// serialized size stays within [`LIMIT`] (§4.5 point 1 and point 2's
/// resolved open question), preserving original enqueue order throughout.
fn split_oversize(updates: Vec<JournalEntry>) -> Vec<Vec<JournalEntry>> {
    if estimate_batch_size(&updates) <= LIMIT {
        return vec![updates];
    }

    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_size = 0usize;

    for entry in updates {
        if carries_oversize_payload(&entry) {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_size = 0;
            }
            batches.push(vec![entry]);
            continue;
        }

        let entry_size = estimate_batch_size(std::slice::from_ref(&entry));
        if current_size + entry_size > LIMIT && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += entry_size;
        current.push(entry);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn carries_oversize_payload(entry: &JournalEntry) -> bool {
    let size = match &entry.event {
        EventType::ExecutionCompleted { result } => result.len(),
        EventType::ContextCompleted { result, .. } => result.len(),
        EventType::InvokeCompleted { result, .. } => result.len(),
        _ => return false,
    };
    size > LIMIT
}
