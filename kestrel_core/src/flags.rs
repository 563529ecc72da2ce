//! Access flags passed by compiled code to the exclusivity entry points.
//!
//! The flags word is ABI: the compiler materializes it as an immediate at
//! every `begin_access` call site, and the runtime steals its low bits for
//! the tagged next-pointer inside the tracked-access record. The bit layout
//! is therefore frozen:
//!
//! ```text
//! ┌──────────────────────────────────┬───────────────┬────────┐
//! │ reserved                         │ nontracked(b5)│ action │
//! │ (must be zero)                   │               │ (b0)   │
//! └──────────────────────────────────┴───────────────┴────────┘
//! ```
//!
//! Bits below `NONTRACKED_BIT` other than the action bit are reserved so a
//! next-pointer tagged with the action code can never collide with a flag.

use std::fmt;

/// Mask covering the action bits in a flags word.
///
/// The same mask extracts the action from a packed next-pointer word, so
/// pointers stored there must be aligned past it.
pub const ACTION_MASK: usize = 0x1;

/// Flag bit marking an access that must not be inserted into the tracked set.
///
/// The paired `end_access` is a no-op for such an access.
pub const NONTRACKED_BIT: usize = 0x20;

// =============================================================================
// AccessAction
// =============================================================================

/// Action performed by a tracked access.
///
/// Only `Modify` participates in conflicts: two overlapping accesses to the
/// same storage conflict iff at least one of them is a `Modify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum AccessAction {
    /// The storage is only read through this access.
    Read = 0,
    /// The storage may be written through this access.
    Modify = 1,
}

impl AccessAction {
    /// Decode an action from the low bits of a flags or link word.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: usize) -> Self {
        if bits & ACTION_MASK == 0 {
            Self::Read
        } else {
            Self::Modify
        }
    }

    /// The action's encoding within `ACTION_MASK`.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> usize {
        self as usize
    }

    /// Human-readable action name used by conflict diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Modify => "modification",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// AccessFlags
// =============================================================================

/// The flags word passed to `begin_access`.
///
/// Packs the [`AccessAction`] with the nontracked bit. `#[repr(transparent)]`
/// over `usize` so compiled code can pass the raw word directly.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct AccessFlags(usize);

impl AccessFlags {
    /// A tracked read access.
    pub const READ: Self = Self(AccessAction::Read as usize);

    /// A tracked modify access.
    pub const MODIFY: Self = Self(AccessAction::Modify as usize);

    /// Build a flags word for the given action.
    #[inline]
    #[must_use]
    pub const fn new(action: AccessAction) -> Self {
        Self(action as usize)
    }

    /// Reconstruct flags from a raw word.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: usize) -> Self {
        Self(bits)
    }

    /// The raw flags word.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> usize {
        self.0
    }

    /// Mark the access as nontracked: the runtime will still check it for
    /// conflicts but will not insert it into the access set.
    #[inline]
    #[must_use]
    pub const fn with_nontracked(self) -> Self {
        Self(self.0 | NONTRACKED_BIT)
    }

    /// The action encoded in these flags.
    #[inline]
    #[must_use]
    pub const fn action(self) -> AccessAction {
        AccessAction::from_bits(self.0)
    }

    /// Whether an access with these flags is inserted into the set.
    #[inline]
    #[must_use]
    pub const fn is_tracking(self) -> bool {
        self.0 & NONTRACKED_BIT == 0
    }
}

impl fmt::Debug for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessFlags")
            .field("action", &self.action())
            .field("tracking", &self.is_tracking())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip() {
        assert_eq!(AccessAction::from_bits(AccessAction::Read.bits()), AccessAction::Read);
        assert_eq!(
            AccessAction::from_bits(AccessAction::Modify.bits()),
            AccessAction::Modify
        );
    }

    #[test]
    fn test_action_decode_masks_high_bits() {
        // Only the action bits participate in decoding.
        assert_eq!(AccessAction::from_bits(NONTRACKED_BIT), AccessAction::Read);
        assert_eq!(AccessAction::from_bits(NONTRACKED_BIT | 1), AccessAction::Modify);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AccessAction::Read.name(), "read");
        assert_eq!(AccessAction::Modify.name(), "modification");
        assert_eq!(AccessAction::Modify.to_string(), "modification");
    }

    #[test]
    fn test_flags_action() {
        assert_eq!(AccessFlags::READ.action(), AccessAction::Read);
        assert_eq!(AccessFlags::MODIFY.action(), AccessAction::Modify);
        assert_eq!(AccessFlags::new(AccessAction::Modify).action(), AccessAction::Modify);
    }

    #[test]
    fn test_flags_tracking_bit() {
        assert!(AccessFlags::READ.is_tracking());
        assert!(AccessFlags::MODIFY.is_tracking());

        let nt = AccessFlags::READ.with_nontracked();
        assert!(!nt.is_tracking());
        // The action survives the nontracked marker.
        assert_eq!(nt.action(), AccessAction::Read);
        assert_eq!(AccessFlags::MODIFY.with_nontracked().action(), AccessAction::Modify);
    }

    #[test]
    fn test_flags_raw_round_trip() {
        let flags = AccessFlags::MODIFY.with_nontracked();
        assert_eq!(AccessFlags::from_bits(flags.bits()), flags);
        assert_eq!(flags.bits(), AccessAction::Modify.bits() | NONTRACKED_BIT);
    }

    #[test]
    fn test_flags_word_sized() {
        // The flags word crosses the compiled-code boundary as a bare usize.
        assert_eq!(
            std::mem::size_of::<AccessFlags>(),
            std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_masks_are_disjoint() {
        assert_eq!(ACTION_MASK & NONTRACKED_BIT, 0);
    }
}
