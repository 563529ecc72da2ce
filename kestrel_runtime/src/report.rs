//! Conflict reporting and the fatal diagnostics path.
//!
//! A detected conflict is unrecoverable: the reporter formats a two-part
//! message (the aliased storage plus both access locations), hands the
//! structured details to any registered debugger hook, and terminates the
//! process without unwinding. Backtrace capture and symbolication are
//! opaque sinks from the tracker's point of view.

use kestrel_core::{AccessAction, TrackerError};
use parking_lot::RwLock;
use std::backtrace::Backtrace;

/// Tag identifying an exclusivity violation to the debugger hook.
pub const VIOLATION_KIND: &str = "exclusivity-violation";

/// Frames belonging to the runtime itself at capture time; symbolicating
/// consumers drop this many frames from the top of the current backtrace.
pub const RUNTIME_FRAMES_TO_SKIP: usize = 1;

// =============================================================================
// Debugger hook
// =============================================================================

/// Structured description of a violation, passed to the debugger hook
/// before the process aborts.
#[derive(Debug)]
pub struct ViolationDetails {
    /// Violation category tag, currently always [`VIOLATION_KIND`].
    pub kind: &'static str,
    /// The aliased storage address.
    pub address: usize,
    /// Description of the access that triggered the conflict.
    pub current_description: String,
    /// Frames to drop from the top of the current thread's backtrace.
    pub frames_to_skip: usize,
    /// Description of the access already in the set.
    pub prior_description: String,
    /// Program counter captured when the prior access began; zero if the
    /// caller supplied none.
    pub prior_pc: usize,
}

/// Callback invoked with the violation details before termination.
pub type DebuggerHook = fn(&ViolationDetails);

static DEBUGGER_HOOK: RwLock<Option<DebuggerHook>> = RwLock::new(None);

/// Install a debugger notification hook.
///
/// The hook runs on the violating thread after the report is printed and
/// before the process aborts. It must not call back into the tracker.
pub fn register_debugger_hook(hook: DebuggerHook) {
    *DEBUGGER_HOOK.write() = Some(hook);
}

// =============================================================================
// Fatal paths
// =============================================================================

/// Report an exclusivity conflict and terminate.
pub(crate) fn exclusivity_conflict(
    prior: AccessAction,
    prior_pc: *mut (),
    current: AccessAction,
    pointer: *mut (),
) -> ! {
    let primary = TrackerError::conflict(pointer as usize, prior, prior_pc as usize, current);
    eprintln!("{primary}.");

    let prior_description = format!("Previous access (a {}) started at", prior.name());
    if prior_pc.is_null() {
        eprintln!("{prior_description} <unknown>.");
    } else {
        eprintln!("{prior_description} {:#x}.", prior_pc as usize);
    }

    let current_description = format!("Current access (a {}) started at", current.name());
    eprintln!("{current_description}:");
    // The top frames are the runtime's own; consumers skip them.
    eprintln!("{}", Backtrace::force_capture());

    let details = ViolationDetails {
        kind: VIOLATION_KIND,
        address: pointer as usize,
        current_description,
        frames_to_skip: RUNTIME_FRAMES_TO_SKIP,
        prior_description,
        prior_pc: prior_pc as usize,
    };
    if let Some(hook) = *DEBUGGER_HOOK.read() {
        hook(&details);
    }

    fatal("Fatal access conflict detected.");
}

/// Report a compiler/runtime contract breach and terminate.
pub(crate) fn invariant_breach(message: &str) -> ! {
    let err = TrackerError::invariant(message);
    fatal(&err.to_string());
}

/// Terminate without unwinding.
///
/// Unit tests drive the conflict paths in-process, so test builds panic
/// here instead of aborting.
pub(crate) fn fatal(message: &str) -> ! {
    #[cfg(test)]
    panic!("{message}");

    #[cfg(not(test))]
    {
        eprintln!("Fatal error: {message}");
        std::process::abort();
    }
}
