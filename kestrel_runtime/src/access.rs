//! Tracked-access records and the compiler scratch-buffer contract.
//!
//! Every enforced access is backed by a compiler-allocated scratch buffer.
//! The runtime treats that buffer as an [`Access`] record and links it into
//! the current thread's intrusive access list — the runtime never allocates
//! for tracking.
//!
//! # Memory Layout (3 pointer words)
//!
//! ```text
//! ┌──────────────┬──────────────┬───────────────────────────────┐
//! │ pointer      │ pc           │ next_and_action               │
//! │ (storage)    │ (diagnostic) │ next ptr | action in low bits │
//! └──────────────┴──────────────┴───────────────────────────────┘
//! ```
//!
//! `pointer` doubles as the "tracked?" discriminant: a null pointer word
//! means the record is not on any list, either because checking was disabled
//! or because the begin was nontracked. `end_access` keys off that word
//! alone.
//!
//! The list link and the action share one word. `ACTION_MASK` covers the low
//! bits; records live in aligned scratch buffers, so a next-pointer can
//! never carry those bits itself.

use kestrel_core::{AccessAction, ACTION_MASK};
use std::ptr;

/// Link bits of the packed `next_and_action` word.
const NEXT_MASK: usize = !ACTION_MASK;

/// Number of pointer-sized words the compiler reserves for one access.
pub const ACCESS_BUFFER_WORDS: usize = 3;

// =============================================================================
// Access
// =============================================================================

/// A single access that the runtime is tracking.
///
/// Lives inside a compiler-provided [`AccessBuffer`]; the runtime owns the
/// contents but not the storage. The record is on the current thread's set
/// iff its pointer word is non-null and it is reachable from the set head.
#[repr(C)]
pub struct Access {
    pointer: *mut (),
    pc: *mut (),
    next_and_action: usize,
}

impl Access {
    /// Store all fields, linking the record in front of `next`.
    #[inline]
    pub(crate) fn initialize(
        &mut self,
        pc: *mut (),
        pointer: *mut (),
        next: *mut Access,
        action: AccessAction,
    ) {
        debug_assert!(
            next as usize & ACTION_MASK == 0,
            "next pointer must be action-bit-aligned"
        );
        self.pointer = pointer;
        self.pc = pc;
        self.next_and_action = next as usize | action.bits();
    }

    /// The next record in the intrusive list, or null at the tail.
    #[inline]
    #[must_use]
    pub fn next(&self) -> *mut Access {
        (self.next_and_action & NEXT_MASK) as *mut Access
    }

    /// Replace the link while preserving the action bits.
    #[inline]
    pub(crate) fn set_next(&mut self, next: *mut Access) {
        debug_assert!(
            next as usize & ACTION_MASK == 0,
            "next pointer must be action-bit-aligned"
        );
        self.next_and_action = next as usize | (self.next_and_action & ACTION_MASK);
    }

    /// The action recorded for this access.
    #[inline]
    #[must_use]
    pub fn action(&self) -> AccessAction {
        AccessAction::from_bits(self.next_and_action & ACTION_MASK)
    }

    /// The storage address this access covers.
    #[inline]
    #[must_use]
    pub fn pointer(&self) -> *mut () {
        self.pointer
    }

    /// Program counter captured for diagnostics; may be null.
    #[inline]
    #[must_use]
    pub fn pc(&self) -> *mut () {
        self.pc
    }

    /// Whether this record is currently tracked on a set.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        !self.pointer.is_null()
    }

    /// Null out the pointer word so the paired `end_access` is a no-op.
    #[inline]
    pub(crate) fn mark_untracked(&mut self) {
        self.pointer = ptr::null_mut();
    }
}

// =============================================================================
// AccessBuffer
// =============================================================================

/// Scratch storage the compiler reserves for one bracketed access.
///
/// The buffer is opaque to compiled code; the runtime reinterprets it as an
/// [`Access`]. New buffers start zeroed, which reads back as an untracked
/// record, and `end_access` re-zeroes the pointer word on removal so one
/// buffer can back any number of sequential begin/end pairs.
#[repr(C)]
pub struct AccessBuffer {
    words: [usize; ACCESS_BUFFER_WORDS],
}

impl AccessBuffer {
    /// A fresh, untracked scratch buffer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; ACCESS_BUFFER_WORDS],
        }
    }

    /// Whether the access backed by this buffer is currently tracked.
    ///
    /// Reads the record's pointer word; meaningful between a `begin_access`
    /// on this buffer and the paired `end_access`.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.words[0] != 0
    }
}

impl Default for AccessBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// The record must fit the scratch contract exactly.
const _: () = {
    assert!(std::mem::size_of::<Access>() <= std::mem::size_of::<AccessBuffer>());
    assert!(std::mem::align_of::<Access>() <= std::mem::align_of::<AccessBuffer>());
};

// =============================================================================
// Tests
// =============================================================================
