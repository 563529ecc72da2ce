//! Dynamic function replacement support.
//!
//! Replaceable functions indirect every call through a replacement pointer.
//! A replacement body that wants to call the function it replaced sets a
//! per-thread recursion flag first; the replaced function's own thunk then
//! consumes the flag and dispatches to the original exactly once.
//!
//! The flag lives in the tracker's [`TlsContext`] only because both are
//! per-thread; it is otherwise independent of access tracking.
//!
//! [`TlsContext`]: crate::tls::TlsContext

use crate::tls::with_context;
use std::ptr;

/// Resolve the function a replaceable call site should dispatch to.
///
/// Returns the replacement, or null when the call should run the current
/// function itself: either no distinct replacement is installed, or the
/// thread's recursion flag was set by [`get_original_of_replaceable`] (the
/// flag is consumed).
///
/// # Safety
///
/// `repl_fn_ptr` must point to a readable function-pointer slot.
pub unsafe fn get_function_replacement(
    repl_fn_ptr: *const *const u8,
    curr_fn: *const u8,
) -> *const u8 {
    let repl_fn = unsafe { *repl_fn_ptr };
    if repl_fn == curr_fn {
        return ptr::null();
    }

    with_context(|ctx| {
        if ctx.call_original_of_replaced_function {
            ctx.call_original_of_replaced_function = false;
            ptr::null()
        } else {
            repl_fn
        }
    })
}

/// Fetch the original of a replaceable function and arm the recursion flag
/// so the next replaceable dispatch on this thread runs the original.
///
/// # Safety
///
/// `orig_fn_ptr` must point to a readable function-pointer slot.
pub unsafe fn get_original_of_replaceable(orig_fn_ptr: *const *const u8) -> *const u8 {
    let orig_fn = unsafe { *orig_fn_ptr };
    with_context(|ctx| ctx.call_original_of_replaced_function = true);
    orig_fn
}
