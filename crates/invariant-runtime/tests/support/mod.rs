use std::sync::{Arc, Mutex};

use invariant_runtime::{CheckpointClient, CheckpointToken};
use invariant_types::JournalEntry;

/// In-memory `CheckpointClient` test double: one unbounded vector of
/// entries, no pagination, no optimistic-concurrency enforcement. Good
/// enough to drive the scenarios in `tests/scenarios.rs` without a real
/// transport.
#[derive(Default)]
pub struct InMemoryClient {
    entries: Mutex<Vec<JournalEntry>>,
}

impl InMemoryClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All entries checkpointed so far, for assertions against the journal
    /// shape a scenario produced.
    pub fn snapshot(&self) -> Vec<JournalEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl CheckpointClient for InMemoryClient {
    fn checkpoint(
        &self,
        _arn: &str,
        _token: &CheckpointToken,
        updates: Vec<JournalEntry>,
    ) -> Result<(CheckpointToken, Vec<JournalEntry>), invariant_runtime::CheckpointError> {
        let mut entries = self.entries.lock().unwrap();
        entries.extend(updates);
        Ok((CheckpointToken::new(), entries.clone()))
    }

    fn get_state(
        &self,
        _arn: &str,
        _marker: Option<&str>,
    ) -> Result<(Vec<JournalEntry>, Option<String>), invariant_runtime::CheckpointError> {
        Ok((self.entries.lock().unwrap().clone(), None))
    }
}
