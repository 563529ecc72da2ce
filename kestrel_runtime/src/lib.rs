//! Dynamic exclusivity tracking for the Kestrel runtime.
//!
//! Compiled Kestrel code brackets every enforced memory access in a
//! `begin_access`/`end_access` pair; this crate maintains the per-thread
//! set of live accesses, detects overlapping modifications of the same
//! storage, and reports conflicts fatally. The cooperative scheduler
//! brackets every task resumption/suspension in a push/pop pair so a task's
//! accesses follow it across worker threads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Worker thread                                │
//! │  ┌───────────────────────────────────────────────────────────┐   │
//! │  │ TlsContext                                                │   │
//! │  │  AccessSet: head ─► [buf] ─► [buf] ─► [buf] ─► null       │   │
//! │  │  (intrusive list through compiler scratch buffers)        │   │
//! │  └───────────────────────────────────────────────────────────┘   │
//! │        ▲ insert/remove                ▲ splice / cut              │
//! │        │                              │                           │
//! │  begin_access / end_access      task_enter / task_exit           │
//! │  (compiled code)                (scheduler, at suspension)       │
//! │                                       │                           │
//! │                          Task: TaskAccessSpan (begin, end)       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conflicts terminate the process through the reporter; nothing here is
//! recoverable. All tracking state is thread-local — the only cross-thread
//! traffic is a suspended task's span, which the scheduler guarantees is
//! never touched while the task runs elsewhere.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod access;
pub mod replacement;
pub mod report;
pub mod set;
pub mod task;
pub mod tls;
pub mod tracking;

#[cfg(debug_assertions)]
pub(crate) mod logging;

pub use access::{Access, AccessBuffer, ACCESS_BUFFER_WORDS};
pub use replacement::{get_function_replacement, get_original_of_replaceable};
pub use report::{register_debugger_hook, DebuggerHook, ViolationDetails};
pub use set::AccessSet;
pub use task::{task_enter_thread_local_context, task_exit_thread_local_context, TaskAccessSpan};
pub use tls::{with_context, TlsContext};
#[cfg(debug_assertions)]
pub use tracking::dump_tracked_accesses;
pub use tracking::{
    begin_access, end_access, is_exclusivity_checking_disabled,
    set_exclusivity_checking_disabled,
};

pub use kestrel_core::{AccessAction, AccessFlags};
