use std::collections::HashMap;

use chrono::Utc;
use invariant_journal::{InvariantState, JournalViolation};
use invariant_types::{EventType, JournalEntry, PromiseId};

/// In-memory mirror of the persisted operation log (C3).
///
/// Maintains the flat, append-only `entries` vector plus an index from
/// `PromiseId` to the positions of its entries, so a single operation's
/// lifecycle can be folded in O(k) rather than O(n). Every `apply` is
/// checked against `invariant_journal::InvariantState` before it is
/// accepted, so a log never holds an internally inconsistent sequence.
pub struct ExecutionLog {
    entries: Vec<JournalEntry>,
    index: HashMap<PromiseId, Vec<usize>>,
    invariants: InvariantState,
    /// Updates applied since the last flush, awaiting delivery to the
    /// checkpoint coordinator (C7).
    pending: Vec<JournalEntry>,
    next_sequence: u64,
}

impl ExecutionLog {
    /// Build a log from a batch of previously-persisted entries (the state
    /// the host delivers at invocation start), replaying each through the
    /// invariant checker to rebuild auxiliary state.
    pub fn seed(entries: Vec<JournalEntry>) -> Result<Self, JournalViolation> {
        let mut log = Self {
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::new(),
            invariants: InvariantState::new(),
            pending: Vec::new(),
            next_sequence: 0,
        };
        for entry in entries {
            log.ingest(entry)?;
        }
        Ok(log)
    }

    fn ingest(&mut self, entry: JournalEntry) -> Result<(), JournalViolation> {
        self.invariants.check_append(&entry)?;
        if let Some(pid) = promise_id_of(&entry.event) {
            self.index.entry(pid).or_default().push(self.entries.len());
        }
        self.next_sequence = entry.sequence + 1;
        self.entries.push(entry);
        Ok(())
    }

    /// Append a freshly-decided event to the log, enqueueing it for the
    /// next flush. Rejects anything that would violate a journal invariant.
    pub fn apply(&mut self, event: EventType) -> Result<PromiseId, JournalViolation> {
        let entry = JournalEntry {
            sequence: self.next_sequence,
            timestamp: Utc::now(),
            event,
        };
        self.invariants.check_append(&entry)?;
        let pid = promise_id_of(&entry.event);
        if let Some(pid) = &pid {
            self.index.entry(pid.clone()).or_default().push(self.entries.len());
        }
        self.next_sequence += 1;
        self.pending.push(entry.clone());
        self.entries.push(entry);
        Ok(pid.unwrap_or_else(root_pid_placeholder))
    }

    /// All events recorded for a given operation id, in journal order.
    pub fn events_for(&self, id: &PromiseId) -> Vec<&EventType> {
        self.index
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i].event)
            .collect()
    }

    /// Whether any event has ever been recorded for `id`.
    pub fn has_record(&self, id: &PromiseId) -> bool {
        self.index.contains_key(id)
    }

    /// Linear scan for a `(kind, name)` pair, keyed by event name label.
    /// Only used by tests and error-report paths per §4.1.
    pub fn by_name(&self, name: &str) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| matches_name(&e.event, name))
            .collect()
    }

    pub fn all_entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Drain and return updates accumulated since the last flush.
    pub fn take_pending(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Entries not tied to a specific promise (none currently -- every event
/// this runtime emits after `ExecutionStarted` carries a `promise_id`) fall
/// back to the execution root so callers always get a usable key. Kept as
/// a narrow escape hatch rather than making `apply`'s return type optional.
fn root_pid_placeholder() -> PromiseId {
    PromiseId::new([0u8; 32])
}

fn promise_id_of(event: &EventType) -> Option<PromiseId> {
    match event {
        EventType::InvokeScheduled { promise_id, .. }
        | EventType::InvokeStarted { promise_id, .. }
        | EventType::InvokeCompleted { promise_id, .. }
        | EventType::InvokeRetrying { promise_id, .. }
        | EventType::InvokeFailed { promise_id, .. }
        | EventType::InvokeTimedOut { promise_id }
        | EventType::InvokeStopped { promise_id }
        | EventType::RandomGenerated { promise_id, .. }
        | EventType::TimeRecorded { promise_id, .. }
        | EventType::TimerScheduled { promise_id, .. }
        | EventType::TimerFired { promise_id }
        | EventType::CallbackScheduled { promise_id, .. }
        | EventType::CallbackHeartbeat { promise_id }
        | EventType::CallbackSucceeded { promise_id, .. }
        | EventType::CallbackFailed { promise_id, .. }
        | EventType::CallbackTimedOut { promise_id }
        | EventType::ExecutionAwaiting { promise_id }
        | EventType::ContextStarted { promise_id, .. }
        | EventType::ContextCompleted { promise_id, .. }
        | EventType::ContextFailed { promise_id, .. } => Some(promise_id.clone()),
        EventType::ExecutionStarted { .. }
        | EventType::ExecutionCompleted { .. }
        | EventType::ExecutionFailed { .. }
        | EventType::CancelRequested { .. }
        | EventType::ExecutionCancelled { .. }
        | EventType::ExecutionResumed => None,
    }
}

fn matches_name(event: &EventType, name: &str) -> bool {
    match event {
        EventType::InvokeScheduled { name: n, .. } => n == name,
        EventType::ContextStarted { name: n, .. } => n == name,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invariant_types::{Codec, InvokeKind, Payload};

    fn payload() -> Payload {
        Payload::new(vec![], Codec::Json)
    }

    #[test]
    fn seed_from_empty_starts_a_fresh_log() {
        let log = ExecutionLog::seed(Vec::new()).unwrap();
        assert!(log.all_entries().is_empty());
        assert!(!log.has_pending());
    }

    #[test]
    fn apply_indexes_events_by_promise_id() {
        let mut log = ExecutionLog::seed(Vec::new()).unwrap();
        log.apply(EventType::ExecutionStarted {
            component_digest: vec![1],
            input: payload(),
            parent_id: None,
            idempotency_key: "k".into(),
        })
        .unwrap();

        let pid = PromiseId::new([1u8; 32]).child(1).unwrap();
        log.apply(EventType::InvokeScheduled {
            promise_id: pid.clone(),
            kind: InvokeKind::Step,
            name: "s".into(),
            input: payload(),
            retry_policy: None,
            semantics: None,
        })
        .unwrap();
        log.apply(EventType::InvokeStarted {
            promise_id: pid.clone(),
            attempt: 1,
        })
        .unwrap();

        assert_eq!(log.events_for(&pid).len(), 2);
        assert!(log.has_record(&pid));
        assert_eq!(log.take_pending().len(), 3);
        assert!(!log.has_pending());
    }

    #[test]
    fn apply_rejects_invariant_violations() {
        let mut log = ExecutionLog::seed(Vec::new()).unwrap();
        let pid = PromiseId::new([2u8; 32]).child(1).unwrap();
        let result = log.apply(EventType::InvokeStarted {
            promise_id: pid,
            attempt: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn by_name_finds_invoke_scheduled_entries() {
        let mut log = ExecutionLog::seed(Vec::new()).unwrap();
        log.apply(EventType::ExecutionStarted {
            component_digest: vec![],
            input: payload(),
            parent_id: None,
            idempotency_key: "k".into(),
        })
        .unwrap();
        let pid = PromiseId::new([3u8; 32]).child(1).unwrap();
        log.apply(EventType::InvokeScheduled {
            promise_id: pid,
            kind: InvokeKind::Step,
            name: "orig".into(),
            input: payload(),
            retry_policy: None,
            semantics: None,
        })
        .unwrap();

        assert_eq!(log.by_name("orig").len(), 1);
        assert_eq!(log.by_name("missing").len(), 0);
    }
}
