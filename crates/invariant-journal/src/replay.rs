use std::collections::HashMap;

use chrono::{DateTime, Utc};
use invariant_types::{EventType, JournalEntry, Payload, PromiseId};

/// Replay-time cached value for a resolved promise.
///
/// Each variant corresponds to one terminal (or value-producing) event kind
/// that can be replayed by promise ID.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedResult {
    /// From `InvokeCompleted { result, .. }`.
    Invoke(Payload),
    /// From `RandomGenerated { value, .. }`.
    Random(Vec<u8>),
    /// From `TimeRecorded { time, .. }`.
    Time(DateTime<Utc>),
    /// From `TimerFired { .. }`.
    Timer,
    /// From `CallbackSucceeded { payload, .. }`.
    Callback(Payload),
    /// From `ContextCompleted { result, .. }`.
    Context(Payload),
}

/// Batch-built replay cache keyed by `PromiseId`.
///
/// Construction is a single O(n) scan over journal entries.
#[derive(Clone, Debug, Default)]
pub struct ReplayCache {
    results: HashMap<PromiseId, CachedResult>,
}

impl ReplayCache {
    /// Build cache entries from a full journal history in one pass.
    ///
    /// Cached event kinds:
    /// - `InvokeCompleted` -> `CachedResult::Invoke`
    /// - `RandomGenerated` -> `CachedResult::Random`
    /// - `TimeRecorded` -> `CachedResult::Time`
    /// - `TimerFired` -> `CachedResult::Timer`
    /// - `CallbackSucceeded` -> `CachedResult::Callback`
    /// - `ContextCompleted` -> `CachedResult::Context`
    ///
    /// Failure terminals (`InvokeFailed`, `CallbackFailed`, `ContextFailed`,
    /// ...) are not cached here -- they surface through `derive_status`/error
    /// propagation rather than a successful replay value.
    pub fn build(entries: &[JournalEntry]) -> Self {
        let mut results = HashMap::new();

        for entry in entries {
            match &entry.event {
                EventType::InvokeCompleted {
                    promise_id, result, ..
                } => {
                    results.insert(promise_id.clone(), CachedResult::Invoke(result.clone()));
                }
                EventType::RandomGenerated { promise_id, value } => {
                    results.insert(promise_id.clone(), CachedResult::Random(value.clone()));
                }
                EventType::TimeRecorded { promise_id, time } => {
                    results.insert(promise_id.clone(), CachedResult::Time(*time));
                }
                EventType::TimerFired { promise_id } => {
                    results.insert(promise_id.clone(), CachedResult::Timer);
                }
                EventType::CallbackSucceeded { promise_id, payload } => {
                    results.insert(promise_id.clone(), CachedResult::Callback(payload.clone()));
                }
                EventType::ContextCompleted { promise_id, result } => {
                    results.insert(promise_id.clone(), CachedResult::Context(result.clone()));
                }
                _ => {}
            }
        }

        Self { results }
    }

    /// Generic lookup by promise ID.
    pub fn lookup(&self, pid: &PromiseId) -> Option<&CachedResult> {
        self.results.get(pid)
    }

    /// Typed accessor for invoke results.
    pub fn get_invoke(&self, pid: &PromiseId) -> Option<&Payload> {
        match self.lookup(pid) {
            Some(CachedResult::Invoke(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Typed accessor for random bytes.
    pub fn get_random(&self, pid: &PromiseId) -> Option<&[u8]> {
        match self.lookup(pid) {
            Some(CachedResult::Random(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// Typed accessor for recorded wall-clock time.
    pub fn get_time(&self, pid: &PromiseId) -> Option<DateTime<Utc>> {
        match self.lookup(pid) {
            Some(CachedResult::Time(time)) => Some(*time),
            _ => None,
        }
    }

    /// True if timer completion was recorded for this promise.
    pub fn is_timer_complete(&self, pid: &PromiseId) -> bool {
        matches!(self.lookup(pid), Some(CachedResult::Timer))
    }

    /// Typed accessor for a succeeded callback's payload.
    pub fn get_callback(&self, pid: &PromiseId) -> Option<&Payload> {
        match self.lookup(pid) {
            Some(CachedResult::Callback(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Typed accessor for a completed child context's result.
    pub fn get_context(&self, pid: &PromiseId) -> Option<&Payload> {
        match self.lookup(pid) {
            Some(CachedResult::Context(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Number of cached promise results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True when no promise results are cached.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
