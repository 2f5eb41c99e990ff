use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use invariant_types::PromiseId;

/// Which kind of logical thread is currently executing, tracked per-OS-thread
/// so `get()` can detect the "nested durable operation from inside a step
/// thunk" misuse (§4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadRole {
    /// A context's logical thread (the root execution or a child context).
    Context,
    /// A worker thread running a step's thunk.
    Step,
}

thread_local! {
    static CURRENT_ROLE: Cell<ThreadRole> = const { Cell::new(ThreadRole::Context) };
    static CURRENT_STEP: RefCell<Option<(PromiseId, u32)>> = const { RefCell::new(None) };
}

/// Run `f` with the calling thread's role set to `role` for its duration.
pub fn with_role<R>(role: ThreadRole, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_ROLE.with(|cell| cell.replace(role));
    let result = f();
    CURRENT_ROLE.with(|cell| cell.set(previous));
    result
}

pub fn current_role() -> ThreadRole {
    CURRENT_ROLE.with(|cell| cell.get())
}

/// Run `thunk` with the calling thread marked as executing step
/// `promise_id`'s attempt `attempt` (§4.6). Nested operation entry points
/// consult [`current_step`] to reject a `get()` issued from inside it.
pub fn with_step_role<R>(promise_id: PromiseId, attempt: u32, thunk: impl FnOnce() -> R) -> R {
    let previous_role = CURRENT_ROLE.with(|cell| cell.replace(ThreadRole::Step));
    let previous_step = CURRENT_STEP.with(|cell| cell.replace(Some((promise_id, attempt))));
    let result = thunk();
    CURRENT_ROLE.with(|cell| cell.set(previous_role));
    CURRENT_STEP.with(|cell| *cell.borrow_mut() = previous_step);
    result
}

/// The step currently executing on this OS thread, if `current_role()` is
/// [`ThreadRole::Step`].
pub fn current_step() -> Option<(PromiseId, u32)> {
    CURRENT_STEP.with(|cell| cell.borrow().clone())
}

/// Per-execution coordination shared by every logical thread and worker
/// (C8). Implements the "park on completion, yield to another runnable
/// thread, or suspend the whole execution" decision from §4.6.
///
/// The Condvar here is generic over the whole execution rather than one per
/// operation: a thread re-checks its own `is_done` predicate each time it is
/// woken, which is the textbook Condvar usage pattern and avoids allocating
/// a dedicated latch per operation.
pub struct Scheduler {
    /// Count of workers/context-threads currently doing work that could
    /// still resolve the operation a parked thread is waiting on.
    runnable: AtomicI64,
    suspend_requested: AtomicBool,
    gate: Mutex<()>,
    progress: Condvar,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runnable: AtomicI64::new(0),
            suspend_requested: AtomicBool::new(false),
            gate: Mutex::new(()),
            progress: Condvar::new(),
        })
    }

    /// Mark the calling thread/worker as doing work that may unblock
    /// parked waiters. Must be paired with [`Scheduler::exit_runnable`].
    pub fn enter_runnable(&self) {
        self.runnable.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark work as finished and wake every parked waiter so it can
    /// re-check its completion predicate.
    pub fn exit_runnable(&self) {
        self.runnable.fetch_sub(1, Ordering::SeqCst);
        let _guard = self.gate.lock().expect("scheduler gate poisoned");
        self.progress.notify_all();
    }

    pub fn runnable_count(&self) -> i64 {
        self.runnable.load(Ordering::SeqCst)
    }

    pub fn request_suspend(&self) {
        self.suspend_requested.store(true, Ordering::SeqCst);
        let _guard = self.gate.lock().expect("scheduler gate poisoned");
        self.progress.notify_all();
    }

    pub fn is_suspend_requested(&self) -> bool {
        self.suspend_requested.load(Ordering::SeqCst)
    }

    /// Block until `is_done()` becomes true, or no other logical thread can
    /// make progress, in which case this requests a whole-execution suspend
    /// and returns `false`. Returns `true` once `is_done()` holds.
    pub fn wait_until(&self, is_done: impl Fn() -> bool) -> bool {
        let mut guard = self.gate.lock().expect("scheduler gate poisoned");
        loop {
            if is_done() {
                return true;
            }
            if self.is_suspend_requested() {
                return false;
            }
            if self.runnable_count() <= 0 {
                drop(guard);
                self.request_suspend();
                return false;
            }
            let (next_guard, _timeout) = self
                .progress
                .wait_timeout(guard, Duration::from_millis(25))
                .expect("scheduler gate poisoned");
            guard = next_guard;
        }
    }
}
