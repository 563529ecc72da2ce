//! Access-boundary entry points called by compiled code.
//!
//! The compiler brackets every enforced access in a `begin_access` /
//! `end_access` pair and passes the same scratch buffer to both. Pairs nest
//! LIFO per thread; the runtime stays correct without that discipline but
//! removal degrades from O(1) to a list walk.
//!
//! Neither entry point contains a suspension point: each completes
//! atomically from the thread's point of view.
//!
//! # Scratch behavior
//!
//! | Pointer arg | Behavior     | Stored pointer | PC arg | Recorded PC |
//! |-------------|--------------|----------------|--------|-------------|
//! | null        | debug trap   | —              | —      | —           |
//! | non-null    | disabled     | null           | any    | discarded   |
//! | non-null    | nontracked   | null           | any    | discarded   |
//! | non-null    | tracked      | same           | null   | entry point |
//! | non-null    | tracked      | same           | valid  | same        |
//!
//! A null stored pointer is the sole signal `end_access` consumes; it makes
//! the paired end a no-op.

use crate::access::{Access, AccessBuffer};
use crate::tls::with_context;
use kestrel_core::AccessFlags;
use std::sync::atomic::{AtomicBool, Ordering};

static EXCLUSIVITY_CHECKING_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable (or re-enable) exclusivity checking process-wide.
///
/// Intended for initialization time, before enforced accesses begin.
/// Accesses begun while disabled stay untracked for their whole lifetime.
pub fn set_exclusivity_checking_disabled(disabled: bool) {
    EXCLUSIVITY_CHECKING_DISABLED.store(disabled, Ordering::Relaxed);
}

/// Whether exclusivity checking is currently disabled.
#[inline]
#[must_use]
pub fn is_exclusivity_checking_disabled() -> bool {
    EXCLUSIVITY_CHECKING_DISABLED.load(Ordering::Relaxed)
}

/// Stand-in diagnostic pc when the caller supplies none. Rust exposes no
/// stable caller-return-address intrinsic, so the entry point records its
/// own code address.
#[inline(never)]
fn entry_pc() -> *mut () {
    entry_pc as fn() -> *mut () as usize as *mut ()
}

/// Begin tracking a dynamic access.
///
/// Checks `pointer` against every live access on this thread and links the
/// scratch record at the head of the thread's set. Terminates the process
/// if an incompatible access to the same storage is already underway.
///
/// If `pc` is null, the runtime substitutes its own code address for
/// diagnostics.
///
/// # Safety
///
/// `buffer` must point to a live [`AccessBuffer`] that stays valid and
/// pinned until the paired [`end_access`]. The buffer must not currently
/// back a tracked access (fresh, or already ended).
pub unsafe fn begin_access(
    pointer: *mut (),
    buffer: *mut AccessBuffer,
    flags: AccessFlags,
    pc: *mut (),
) {
    debug_assert!(!pointer.is_null(), "beginning an access on a null pointer");

    let access = buffer.cast::<Access>();
    debug_assert!(
        !unsafe { (*access).is_tracked() },
        "scratch buffer reused without an intervening end_access"
    );

    // Record in the scratch that nothing was tracked; the paired end keys
    // off the null pointer word.
    if is_exclusivity_checking_disabled() {
        unsafe { (*access).mark_untracked() };
        return;
    }

    let pc = if pc.is_null() { entry_pc() } else { pc };

    let tracked = with_context(|ctx| unsafe { ctx.access_set.insert(access, pc, pointer, flags) });
    if !tracked {
        unsafe { (*access).mark_untracked() };
    }
}

/// End tracking a dynamic access.
///
/// A no-op when the scratch holds no tracked access (checking was disabled
/// or the begin was nontracked). Otherwise removes the record and re-zeroes
/// its pointer word so the buffer can back the next bracketed access.
///
/// # Safety
///
/// `buffer` must point to a live [`AccessBuffer`] previously passed to
/// [`begin_access`] on this thread (or installed on this thread by the task
/// push protocol), with no `end_access` in between.
pub unsafe fn end_access(buffer: *mut AccessBuffer) {
    let access = buffer.cast::<Access>();
    if !unsafe { (*access).is_tracked() } {
        return;
    }

    with_context(|ctx| unsafe { ctx.access_set.remove(access) });
    unsafe { (*access).mark_untracked() };
}

/// Write the current thread's tracked accesses to stderr.
///
/// Debugger aid, available in debug builds.
#[cfg(debug_assertions)]
pub fn dump_tracked_accesses() {
    with_context(|ctx| unsafe { ctx.access_set.dump_to_stderr() });
}

// =============================================================================
// Tests
// =============================================================================
