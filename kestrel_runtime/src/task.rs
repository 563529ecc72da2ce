//! Task suspension support: the access-set push/pop protocol.
//!
//! A task's live accesses must follow it across suspension and resumption,
//! including resumption on a different worker thread, without leaking into
//! the synchronous code around it. The scheduler reserves two pointer-sized
//! slots in every task object — a [`TaskAccessSpan`] — and brackets every
//! run of the task with [`task_enter_thread_local_context`] (push, just
//! before the task resumes) and [`task_exit_thread_local_context`] (pop,
//! just before it yields).
//!
//! While the task runs, its accesses sit contiguously at the head of the
//! thread's list and both span slots are null. While it is suspended, the
//! thread's list holds only the surrounding synchronous accesses and the
//! task's records live entirely in the span.
//!
//! # The eight cases
//!
//! Three booleans drive the protocol: did the task carry accesses into the
//! push, did the thread carry synchronous accesses at push, and does the
//! task hold accesses at pop.
//!
//! ```text
//! push (H = thread head, TB/TE = span):
//! ┌───────────────┬───────────┬──────────────────────────────────────────┐
//! │ task accesses │ sync head │ action                                   │
//! ├───────────────┼───────────┼──────────────────────────────────────────┤
//! │ none          │ null      │ nothing to do                            │
//! │ none          │ non-null  │ TB ← H (pivot only; H untouched)         │
//! │ some          │ null      │ H ← TB; TB,TE ← null                     │
//! │ some          │ non-null  │ H ← TB; TE.next ← old H; TB ← old H;     │
//! │               │           │ TE ← null                                │
//! └───────────────┴───────────┴──────────────────────────────────────────┘
//!
//! pop, symmetric:
//! ┌───────────────┬───────────┬──────────────────────────────────────────┐
//! │ TB (stash)    │ H at pop  │ action                                   │
//! ├───────────────┼───────────┼──────────────────────────────────────────┤
//! │ null          │ null      │ nothing to do                            │
//! │ null          │ non-null  │ TB ← H; TE ← tail(H); H ← null           │
//! │ non-null      │ H == TB   │ TB ← null (task added nothing)           │
//! │ non-null      │ H != TB   │ TE ← parent(TB); H ← TB; TE.next ← null; │
//! │               │           │ TB ← old H                               │
//! └───────────────┴───────────┴──────────────────────────────────────────┘
//! ```
//!
//! When the task carried no accesses into a push but the thread did, `TB`
//! is *not* a task-owned record: it is a pivot pointing at the synchronous
//! head that existed at push time, kept solely so pop can tell "the task
//! created accesses" (`H != TB`) from "it did not" (`H == TB`). Collapsing
//! that dual meaning breaks the splice cases.
//!
//! Push is O(1) in every case — the task's own stash already knows its
//! tail. Pop walks the task-owned prefix when it must find a tail or the
//! pivot's parent.
//!
//! Two tasks touching the same storage are never compared: cross-task
//! exclusivity is undefined behavior by design, not diagnosed here.

use crate::access::Access;
use crate::report;
use crate::set::AccessSet;
use crate::tls::with_context;
use std::ptr;

// =============================================================================
// TaskAccessSpan
// =============================================================================

/// The two pointer-sized slots the scheduler reserves inside each task.
///
/// While the task is suspended, `(begin, end)` delimit the contiguous
/// sublist of access records owned by the task. While it runs, both are
/// null — except that `begin` may transiently stash the suspension pivot
/// (see the module docs). The runtime never reads any other task field.
#[repr(C)]
#[derive(Debug)]
pub struct TaskAccessSpan {
    begin: *mut Access,
    end: *mut Access,
}

impl TaskAccessSpan {
    /// The span of a task that has never run and holds no accesses.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            begin: ptr::null_mut(),
            end: ptr::null_mut(),
        }
    }

    /// Whether the span currently stashes a head (task accesses while
    /// suspended, or the pivot while running).
    #[inline]
    #[must_use]
    pub fn has_initial_accesses(&self) -> bool {
        !self.begin.is_null()
    }

    /// First record of the saved span, or null.
    #[inline]
    #[must_use]
    pub fn begin(&self) -> *mut Access {
        self.begin
    }

    /// Last record of the saved span, or null.
    #[inline]
    #[must_use]
    pub fn end(&self) -> *mut Access {
        self.end
    }

    #[cfg(debug_assertions)]
    fn dump(&self) {
        eprintln!(
            "        TaskAccessSpan: (begin, end): ({:p}, {:p})",
            self.begin, self.end
        );
    }
}

impl Default for TaskAccessSpan {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Entry points
// =============================================================================

#[cfg(debug_assertions)]
unsafe fn log_swizzle(direction: &str, phase: &str, task: &TaskAccessSpan, set: &AccessSet) {
    if crate::logging::enabled() {
        crate::logging::with_stderr_lock(|| {
            eprintln!("{direction} Thread Local Context. {phase} Swizzle.");
            task.dump();
            unsafe { set.dump_to_stderr() };
        });
    }
}

/// Install a task's saved accesses onto the current thread.
///
/// Called by the scheduler immediately before resuming the task, on the
/// thread that will run it.
///
/// # Safety
///
/// `span` must point to the task's live [`TaskAccessSpan`], the task must
/// not be running anywhere, and every record reachable from the span must
/// be valid. Must be paired with [`task_exit_thread_local_context`] before
/// the task yields.
pub unsafe fn task_enter_thread_local_context(span: *mut TaskAccessSpan) {
    with_context(|ctx| {
        let task = unsafe { &mut *span };
        let set = &mut ctx.access_set;

        #[cfg(debug_assertions)]
        unsafe {
            log_swizzle("Entering", "Before", task, set)
        };

        unsafe { push_cases(task, set) };

        #[cfg(debug_assertions)]
        unsafe {
            log_swizzle("Entering", "After", task, set)
        };
    });
}

/// Extract the task-owned accesses from the current thread into the task.
///
/// Called by the scheduler immediately before the task yields, on the
/// thread it ran on. Restores the synchronous accesses that were live at
/// the matching push.
///
/// # Safety
///
/// Same contract as [`task_enter_thread_local_context`]; `span` must be the
/// one passed to the matching push on this thread.
pub unsafe fn task_exit_thread_local_context(span: *mut TaskAccessSpan) {
    with_context(|ctx| {
        let task = unsafe { &mut *span };
        let set = &mut ctx.access_set;

        #[cfg(debug_assertions)]
        unsafe {
            log_swizzle("Exiting", "Before", task, set)
        };

        unsafe { pop_cases(task, set) };

        #[cfg(debug_assertions)]
        unsafe {
            log_swizzle("Exiting", "After", task, set)
        };
    });
}

unsafe fn push_cases(task: &mut TaskAccessSpan, set: &mut AccessSet) {
    // Task carries no accesses in.
    if !task.has_initial_accesses() {
        // Neither does the thread: code with no live accesses pays nothing.
        if set.is_empty() {
            return;
        }

        // Stash the synchronous head as the pivot; the thread list is
        // already exactly what the task should observe.
        task.begin = set.head();
        return;
    }

    // Task has accesses, thread has none: the task's list becomes the
    // thread's list wholesale.
    if set.is_empty() {
        set.set_head(task.begin);
        task.begin = ptr::null_mut();
        task.end = ptr::null_mut();
        return;
    }

    // Both sides live: splice the task span in front of the synchronous
    // span and stash the old head as the pivot.
    let old_head = set.head();
    let tail = task.end;

    set.set_head(task.begin);
    unsafe { (*tail).set_next(old_head) };
    task.begin = old_head;
    task.end = ptr::null_mut();
}

unsafe fn pop_cases(task: &mut TaskAccessSpan, set: &mut AccessSet) {
    let pivot = task.begin;

    // No pivot: the synchronous set was empty at push.
    if pivot.is_null() {
        // Still empty: either the task brought nothing, or everything it
        // brought ended while it ran.
        if set.is_empty() {
            debug_assert!(task.end.is_null(), "span end must be null after push");
            return;
        }

        // Every live access belongs to the task; capture the whole list.
        let new_head = set.head();
        let new_tail = unsafe { set.tail() };
        set.set_head(ptr::null_mut());
        task.begin = new_head;
        task.end = new_tail;
        return;
    }

    // The head never moved past the pivot: the task created nothing on top
    // of the synchronous accesses.
    if set.head() == pivot {
        task.begin = ptr::null_mut();
        task.end = ptr::null_mut();
        return;
    }

    // Task-owned records sit between the head and the pivot. Cut the list
    // at the pivot's parent and hand the prefix to the task.
    let new_head = set.head();
    let new_end = unsafe { set.find_parent(pivot) };
    if new_end.is_null() {
        report::invariant_breach("suspension pivot not reachable from the thread's access set");
    }

    set.set_head(pivot);
    unsafe { (*new_end).set_next(ptr::null_mut()) };
    task.begin = new_head;
    task.end = new_end;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessBuffer;
    use crate::tracking::{begin_access, end_access};
    use kestrel_core::AccessFlags;

    fn thread_head() -> *mut Access {
        with_context(|ctx| ctx.access_set.head())
    }

    fn thread_set_is_empty() -> bool {
        with_context(|ctx| ctx.access_set.is_empty())
    }

    unsafe fn begin(pointer: usize, buffer: &mut AccessBuffer, flags: AccessFlags) {
        unsafe { begin_access(pointer as *mut (), buffer, flags, ptr::null_mut()) };
    }

    #[test]
    fn test_case_1_all_empty_is_noop() {
        let mut span = TaskAccessSpan::new();

        unsafe {
            task_enter_thread_local_context(&mut span);
            assert!(span.begin().is_null());
            assert!(thread_set_is_empty());

            task_exit_thread_local_context(&mut span);
        }
        assert!(span.begin().is_null());
        assert!(span.end().is_null());
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_2_task_creates_accesses_from_scratch() {
        let mut span = TaskAccessSpan::new();
        let mut buffer = AccessBuffer::new();

        unsafe {
            task_enter_thread_local_context(&mut span);
            begin(0x2000, &mut buffer, AccessFlags::MODIFY);
            let record = thread_head();

            task_exit_thread_local_context(&mut span);

            // The whole list moved into the span.
            assert!(thread_set_is_empty());
            assert_eq!(span.begin(), record);
            assert_eq!(span.end(), record);
            assert!((*record).next().is_null());

            // Resume and end the access to drain.
            task_enter_thread_local_context(&mut span);
            assert!(span.begin().is_null());
            end_access(&mut buffer);
            task_exit_thread_local_context(&mut span);
        }
        assert!(span.begin().is_null());
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_3_pivot_set_and_cleared() {
        let mut sync_buffer = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            begin(0x1000, &mut sync_buffer, AccessFlags::READ);
            let sync_record = thread_head();

            task_enter_thread_local_context(&mut span);
            // The pivot records the synchronous head; the thread list is
            // untouched.
            assert_eq!(span.begin(), sync_record);
            assert!(span.end().is_null());
            assert_eq!(thread_head(), sync_record);

            task_exit_thread_local_context(&mut span);
            assert!(span.begin().is_null());
            assert!(span.end().is_null());
            assert_eq!(thread_head(), sync_record);

            end_access(&mut sync_buffer);
        }
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_4_task_adds_on_top_of_sync() {
        let mut sync_buffer = AccessBuffer::new();
        let mut task_buffer = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            begin(0x1000, &mut sync_buffer, AccessFlags::READ);
            let sync_record = thread_head();

            task_enter_thread_local_context(&mut span);
            begin(0x2000, &mut task_buffer, AccessFlags::MODIFY);
            let task_record = thread_head();

            task_exit_thread_local_context(&mut span);

            // The synchronous record is back at the head; the task record
            // was cut out into the span with its link severed.
            assert_eq!(thread_head(), sync_record);
            assert_eq!(span.begin(), task_record);
            assert_eq!(span.end(), task_record);
            assert!((*task_record).next().is_null());

            // Resume (splice back), finish the task access, suspend.
            task_enter_thread_local_context(&mut span);
            assert_eq!(thread_head(), task_record);
            assert_eq!((*task_record).next(), sync_record);
            end_access(&mut task_buffer);
            task_exit_thread_local_context(&mut span);

            assert!(span.begin().is_null());
            end_access(&mut sync_buffer);
        }
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_5_task_accesses_end_while_running() {
        let mut task_buffer = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            // Capture one task-owned access into the span.
            task_enter_thread_local_context(&mut span);
            begin(0x3000, &mut task_buffer, AccessFlags::MODIFY);
            task_exit_thread_local_context(&mut span);
            assert!(span.has_initial_accesses());

            // Resume over an empty thread: the span's list is installed
            // wholesale.
            task_enter_thread_local_context(&mut span);
            assert!(span.begin().is_null());
            assert!(span.end().is_null());
            assert!(!thread_set_is_empty());

            // The access ends inside the task; the pop sees nothing left.
            end_access(&mut task_buffer);
            task_exit_thread_local_context(&mut span);
        }
        assert!(span.begin().is_null());
        assert!(span.end().is_null());
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_6_task_keeps_and_adds_accesses_over_empty_sync() {
        let mut first = AccessBuffer::new();
        let mut second = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            task_enter_thread_local_context(&mut span);
            begin(0x3000, &mut first, AccessFlags::READ);
            task_exit_thread_local_context(&mut span);

            task_enter_thread_local_context(&mut span);
            begin(0x4000, &mut second, AccessFlags::MODIFY);
            task_exit_thread_local_context(&mut span);

            // Both records travel with the task, newest first.
            assert!(thread_set_is_empty());
            let head = span.begin();
            let tail = span.end();
            assert_eq!((*head).pointer(), 0x4000 as *mut ());
            assert_eq!((*head).next(), tail);
            assert_eq!((*tail).pointer(), 0x3000 as *mut ());
            assert!((*tail).next().is_null());

            task_enter_thread_local_context(&mut span);
            end_access(&mut second);
            end_access(&mut first);
            task_exit_thread_local_context(&mut span);
        }
        assert!(span.begin().is_null());
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_7_task_and_sync_both_live_no_new_accesses() {
        let mut sync_buffer = AccessBuffer::new();
        let mut task_buffer = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            // Capture a task-owned access.
            task_enter_thread_local_context(&mut span);
            begin(0x3000, &mut task_buffer, AccessFlags::MODIFY);
            task_exit_thread_local_context(&mut span);
            let task_record = span.begin();

            // Synchronous code on this thread starts its own access.
            begin(0x1000, &mut sync_buffer, AccessFlags::READ);
            let sync_record = thread_head();

            // Resume: the task span is spliced in front of the sync span.
            task_enter_thread_local_context(&mut span);
            assert_eq!(thread_head(), task_record);
            assert_eq!((*task_record).next(), sync_record);
            assert_eq!(span.begin(), sync_record);
            assert!(span.end().is_null());

            // Suspend without new accesses: the splice is undone exactly.
            task_exit_thread_local_context(&mut span);
            assert_eq!(thread_head(), sync_record);
            assert!((*sync_record).next().is_null());
            assert_eq!(span.begin(), task_record);
            assert_eq!(span.end(), task_record);
            assert!((*task_record).next().is_null());

            // Drain.
            task_enter_thread_local_context(&mut span);
            end_access(&mut task_buffer);
            task_exit_thread_local_context(&mut span);
            end_access(&mut sync_buffer);
        }
        assert!(span.begin().is_null());
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_case_8_task_and_sync_both_live_with_new_accesses() {
        let mut sync_buffer = AccessBuffer::new();
        let mut task_buffer = AccessBuffer::new();
        let mut new_buffer = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            task_enter_thread_local_context(&mut span);
            begin(0x3000, &mut task_buffer, AccessFlags::MODIFY);
            task_exit_thread_local_context(&mut span);
            let task_record = span.begin();

            begin(0x1000, &mut sync_buffer, AccessFlags::READ);
            let sync_record = thread_head();

            task_enter_thread_local_context(&mut span);
            begin(0x4000, &mut new_buffer, AccessFlags::MODIFY);
            let new_record = thread_head();

            task_exit_thread_local_context(&mut span);

            // Sync list restored; span holds newest -> oldest task records.
            assert_eq!(thread_head(), sync_record);
            assert!((*sync_record).next().is_null());
            assert_eq!(span.begin(), new_record);
            assert_eq!(span.end(), task_record);
            assert_eq!((*new_record).next(), task_record);
            assert!((*task_record).next().is_null());

            // Drain everything.
            task_enter_thread_local_context(&mut span);
            end_access(&mut new_buffer);
            end_access(&mut task_buffer);
            task_exit_thread_local_context(&mut span);
            end_access(&mut sync_buffer);
        }
        assert!(span.begin().is_null());
        assert!(thread_set_is_empty());
    }

    #[test]
    fn test_push_pop_pair_restores_exact_state() {
        let mut sync_buffer = AccessBuffer::new();
        let mut span = TaskAccessSpan::new();

        unsafe {
            begin(0x1000, &mut sync_buffer, AccessFlags::MODIFY);
            let head_before = thread_head();

            for _ in 0..4 {
                task_enter_thread_local_context(&mut span);
                task_exit_thread_local_context(&mut span);
            }

            assert_eq!(thread_head(), head_before);
            assert!(span.begin().is_null());
            assert!(span.end().is_null());

            end_access(&mut sync_buffer);
        }
        assert!(thread_set_is_empty());
    }
}
