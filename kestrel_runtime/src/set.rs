//! The per-thread set of live accesses.
//!
//! An intrusive singly-linked list threaded through compiler-owned
//! [`Access`] records. The set owns *membership*, not storage: presence in
//! the list is the authoritative "is tracked" state for a record.
//!
//! Insertion is LIFO — new records go at the head — so the common strictly
//! nested begin/end discipline removes from the head in O(1). Removal still
//! walks when pairing is imperfect, so correctness never depends on nesting.
//!
//! Conflict detection uses pointer identity only: two live accesses conflict
//! iff their storage pointers are bitwise equal and at least one is a
//! modification. The compiler canonicalizes aliases before emitting the
//! access; overlap analysis does not belong here.
//!
//! Accesses that were never handed to a task must stay on the thread that
//! began them; migrating them any other way is unsupported.

use crate::access::Access;
use crate::report;
use kestrel_core::{AccessAction, AccessFlags};
use std::ptr;

/// Head of the current thread's intrusive access list.
pub struct AccessSet {
    head: *mut Access,
}

impl AccessSet {
    /// An empty set.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    /// Whether any access is currently tracked on this thread.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    #[inline]
    pub(crate) fn head(&self) -> *mut Access {
        self.head
    }

    #[inline]
    pub(crate) fn set_head(&mut self, head: *mut Access) {
        self.head = head;
    }

    /// Check `pointer` against every live access and link `access` at the
    /// head.
    ///
    /// Reports a fatal conflict if the set already holds an access to the
    /// same storage and either side is a modification; identical reads
    /// coexist. Returns `true` iff the record was added — nontracked flags
    /// decline the insertion after the conflict scan.
    ///
    /// # Safety
    ///
    /// `access` must point to a record that stays valid and pinned for as
    /// long as it remains on the set, and must not already be on any list.
    /// Every record reachable from the head must be valid.
    pub unsafe fn insert(
        &mut self,
        access: *mut Access,
        pc: *mut (),
        pointer: *mut (),
        flags: AccessFlags,
    ) -> bool {
        #[cfg(debug_assertions)]
        if crate::logging::enabled() {
            crate::logging::with_stderr_lock(|| eprintln!("Inserting new access: {access:p}"));
        }

        let action = flags.action();

        let mut cur = self.head;
        while !cur.is_null() {
            let record = unsafe { &*cur };
            if record.pointer() == pointer {
                // Read over read is the one benign overlap.
                let both_reads =
                    action == AccessAction::Read && record.action() == AccessAction::Read;
                if !both_reads {
                    report::exclusivity_conflict(record.action(), record.pc(), action, pointer);
                }
            }
            cur = record.next();
        }

        if !flags.is_tracking() {
            #[cfg(debug_assertions)]
            if crate::logging::enabled() {
                crate::logging::with_stderr_lock(|| eprintln!("  Not tracking!"));
            }
            return false;
        }

        unsafe { (*access).initialize(pc, pointer, self.head, action) };
        self.head = access;

        #[cfg(debug_assertions)]
        if crate::logging::enabled() {
            crate::logging::with_stderr_lock(|| {
                eprintln!("  Tracking!");
                unsafe { self.dump_to_stderr() };
            });
        }
        true
    }

    /// Unlink `access` from the set.
    ///
    /// O(1) when the access is the head (strict nesting), otherwise walks to
    /// its predecessor. An access that is not on the set is a
    /// compiler/runtime contract breach and is fatal.
    ///
    /// # Safety
    ///
    /// `access` must have been inserted into this set and not yet removed.
    pub unsafe fn remove(&mut self, access: *mut Access) {
        if self.head.is_null() {
            report::invariant_breach("removal from empty access set");
        }

        #[cfg(debug_assertions)]
        if crate::logging::enabled() {
            crate::logging::with_stderr_lock(|| eprintln!("Removing access: {access:p}"));
        }

        // Fast path: stack discipline.
        if self.head == access {
            self.head = unsafe { (*access).next() };
            return;
        }

        let mut last = self.head;
        let mut cur = unsafe { (*last).next() };
        while !cur.is_null() {
            if cur == access {
                let next = unsafe { (*cur).next() };
                unsafe { (*last).set_next(next) };
                return;
            }
            last = cur;
            cur = unsafe { (*cur).next() };
        }

        report::invariant_breach("access not found in set");
    }

    /// The predecessor of `child` in the list, or null when `child` is the
    /// head or is not reachable.
    ///
    /// # Safety
    ///
    /// Every record reachable from the head must be valid.
    pub(crate) unsafe fn find_parent(&self, child: *mut Access) -> *mut Access {
        if self.head.is_null() || self.head == child {
            return ptr::null_mut();
        }

        let mut last = self.head;
        let mut cur = unsafe { (*last).next() };
        while !cur.is_null() {
            if cur == child {
                return last;
            }
            last = cur;
            cur = unsafe { (*cur).next() };
        }
        ptr::null_mut()
    }

    /// The last record in the list, or null for an empty set.
    ///
    /// # Safety
    ///
    /// Every record reachable from the head must be valid.
    pub(crate) unsafe fn tail(&self) -> *mut Access {
        let mut cur = self.head;
        if cur.is_null() {
            return ptr::null_mut();
        }
        loop {
            let next = unsafe { (*cur).next() };
            if next.is_null() {
                return cur;
            }
            cur = next;
        }
    }

    /// Diagnostic traversal over every tracked record, head first.
    ///
    /// # Safety
    ///
    /// Every record reachable from the head must be valid, and `f` must not
    /// mutate the list.
    pub unsafe fn for_each(&self, mut f: impl FnMut(&Access)) {
        let mut cur = self.head;
        while !cur.is_null() {
            let record = unsafe { &*cur };
            f(record);
            cur = record.next();
        }
    }

    /// Write the set to stderr, one line per record.
    ///
    /// # Safety
    ///
    /// Every record reachable from the head must be valid.
    #[cfg(debug_assertions)]
    pub(crate) unsafe fn dump_to_stderr(&self) {
        if self.is_empty() {
            eprintln!("        No Accesses.");
            return;
        }
        unsafe {
            self.for_each(|record| {
                eprintln!(
                    "        Access. Pointer: {:p}. PC: {:p}. Action: {}",
                    record.pointer(),
                    record.pc(),
                    record.action()
                );
            });
        }
    }
}

impl Default for AccessSet {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
