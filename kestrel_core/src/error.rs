//! Error types for the Kestrel exclusivity runtime.
//!
//! Nothing here is recoverable: an exclusivity conflict or a tracker
//! invariant breach terminates the process. The types exist so every fatal
//! diagnostic is formatted through one structured path and so a debugger
//! hook can observe the violation before the abort.

use crate::flags::AccessAction;
use thiserror::Error;

/// The result type used by fallible runtime configuration paths.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Fatal conditions detected by the exclusivity tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Two live accesses to the same storage, at least one of them a
    /// modification. The message is the primary line of the conflict report.
    #[error("Simultaneous accesses to {address:#x}, but modification requires exclusive access")]
    AccessConflict {
        /// The aliased storage address.
        address: usize,
        /// Action of the access already in the set.
        prior: AccessAction,
        /// Program counter captured when the prior access began; zero if
        /// the caller supplied none.
        prior_pc: usize,
        /// Action of the access that triggered the conflict.
        current: AccessAction,
    },

    /// A compiler/runtime contract violation, e.g. removing an access that
    /// is not on the current thread's set.
    #[error("InvariantBreach: {message}")]
    InvariantBreach {
        /// Diagnostic description of the breach.
        message: String,
    },
}

impl TrackerError {
    /// Create a conflict error.
    #[must_use]
    pub fn conflict(
        address: usize,
        prior: AccessAction,
        prior_pc: usize,
        current: AccessAction,
    ) -> Self {
        Self::AccessConflict {
            address,
            prior,
            prior_pc,
            current,
        }
    }

    /// Create an invariant-breach error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantBreach {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_primary_line() {
        let err = TrackerError::conflict(0x1000, AccessAction::Read, 0, AccessAction::Modify);
        assert_eq!(
            err.to_string(),
            "Simultaneous accesses to 0x1000, but modification requires exclusive access"
        );
    }

    #[test]
    fn test_conflict_fields() {
        let err = TrackerError::conflict(0x2000, AccessAction::Modify, 0xdead, AccessAction::Read);
        match err {
            TrackerError::AccessConflict {
                address,
                prior,
                prior_pc,
                current,
            } => {
                assert_eq!(address, 0x2000);
                assert_eq!(prior, AccessAction::Modify);
                assert_eq!(prior_pc, 0xdead);
                assert_eq!(current, AccessAction::Read);
            }
            TrackerError::InvariantBreach { .. } => panic!("Expected AccessConflict"),
        }
    }

    #[test]
    fn test_invariant_breach_display() {
        let err = TrackerError::invariant("access not found in set");
        assert_eq!(err.to_string(), "InvariantBreach: access not found in set");
    }
}
