//! Per-thread tracker state and the single accessor.
//!
//! One [`TlsContext`] exists per worker thread, created lazily on first use
//! and released when the thread exits. It bundles the thread's access set
//! with the function-replacement recursion flag — the flag is an unrelated
//! feature that shares residence only because both are per-thread and cheap
//! to keep together.
//!
//! [`with_context`] is the sole way to reach the context. Callers must never
//! cache anything derived from it across a point where the running task may
//! migrate between threads; the task push/pop entry points are the only such
//! boundaries and they re-fetch on every call.

use crate::set::AccessSet;

/// Per-thread container for the tracker's state.
pub struct TlsContext {
    /// The set of accesses currently tracked on this thread.
    pub(crate) access_set: AccessSet,
    /// The "implicit" parameter consumed by dynamically replaceable
    /// functions: when set, the original function runs instead of its
    /// replacement.
    pub(crate) call_original_of_replaced_function: bool,
}

impl TlsContext {
    const fn new() -> Self {
        Self {
            access_set: AccessSet::new(),
            call_original_of_replaced_function: false,
        }
    }

    /// The thread's access set.
    #[inline]
    #[must_use]
    pub fn access_set(&mut self) -> &mut AccessSet {
        &mut self.access_set
    }
}

/// Run `f` with the current thread's context, creating it on first use.
///
/// Non-reentrant: `f` must not call back into `with_context`. The runtime's
/// own operations complete without suspension points, so this never nests.
#[cfg(not(feature = "single-threaded"))]
pub fn with_context<R>(f: impl FnOnce(&mut TlsContext) -> R) -> R {
    use std::cell::RefCell;

    thread_local! {
        static CONTEXT: RefCell<TlsContext> = const { RefCell::new(TlsContext::new()) };
    }

    CONTEXT.with(|cell| f(&mut cell.borrow_mut()))
}

/// Run `f` with the process-wide context.
///
/// Single-threaded builds collapse the per-thread context into one static
/// instance; the embedder promises no second thread exists.
#[cfg(feature = "single-threaded")]
pub fn with_context<R>(f: impl FnOnce(&mut TlsContext) -> R) -> R {
    use std::cell::UnsafeCell;

    struct SingleThreaded(UnsafeCell<TlsContext>);
    // Safety: the `single-threaded` feature is the embedder's promise that
    // only one thread ever runs.
    unsafe impl Sync for SingleThreaded {}

    static CONTEXT: SingleThreaded = SingleThreaded(UnsafeCell::new(TlsContext::new()));

    unsafe { f(&mut *CONTEXT.0.get()) }
}
