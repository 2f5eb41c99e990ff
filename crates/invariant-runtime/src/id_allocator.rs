use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use invariant_types::{DomainError, PromiseId};

/// Per-context monotonic id allocator (C4).
///
/// Each `Context` (including the root execution) owns exactly one of these,
/// live only on that context's logical thread. Ids are allocated lazily, one
/// per call site, by appending the next sequence number to the context's own
/// `PromiseId` via [`PromiseId::child`].
pub struct IdAllocator {
    context_id: PromiseId,
    next_seq: Cell<u32>,
}

impl IdAllocator {
    pub fn new(context_id: PromiseId) -> Self {
        Self {
            context_id,
            next_seq: Cell::new(1),
        }
    }

    pub fn context_id(&self) -> &PromiseId {
        &self.context_id
    }

    /// Allocate the next operation id in this context.
    ///
    /// Fails only once the context's path already holds `MAX_CALL_DEPTH`
    /// segments (`PromiseId::child`'s own guard).
    pub fn next(&self) -> Result<PromiseId, DomainError> {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.context_id.child(seq)
    }
}

/// Shared per-execution replay cursor.
///
/// `replaying` starts `true` iff the seeded log held more than the bare
/// `ExecutionStarted` record, and flips to `false` the first time an
/// operation lookup finds no record or a non-terminal one (§4.2). Once
/// false it may never flip back within the invocation, so this only ever
/// transitions true -> false.
#[derive(Clone)]
pub struct ReplayCursor {
    replaying: Arc<AtomicBool>,
}

impl ReplayCursor {
    pub fn new(initially_replaying: bool) -> Self {
        Self {
            replaying: Arc::new(AtomicBool::new(initially_replaying)),
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    /// Record that live execution has started. Idempotent; never un-sets.
    pub fn mark_live(&self) {
        self.replaying.store(false, Ordering::SeqCst);
    }
}
