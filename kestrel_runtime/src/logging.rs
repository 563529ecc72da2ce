//! Verbose exclusivity tracing for debug builds.
//!
//! When `KESTREL_DEBUG_EXCLUSIVITY_LOGGING` is set in the environment,
//! every insert/remove and every task push/pop emits before/after dumps of
//! the tracked state. Output is serialized under one stderr lock so
//! interleaved threads stay deterministic line by line.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static LOGGING_ENABLED: Lazy<bool> = Lazy::new(|| {
    std::env::var_os("KESTREL_DEBUG_EXCLUSIVITY_LOGGING").is_some_and(|value| value != "0")
});

static STDERR_LOCK: Mutex<()> = Mutex::new(());

/// Whether the verbose trace was requested for this process.
#[inline]
pub(crate) fn enabled() -> bool {
    *LOGGING_ENABLED
}

/// Run `f` while holding the stderr lock.
pub(crate) fn with_stderr_lock(f: impl FnOnce()) {
    let _guard = STDERR_LOCK.lock();
    f();
}
