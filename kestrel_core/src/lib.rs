//! # Kestrel Core
//!
//! Core types shared across the Kestrel runtime components.
//!
//! This crate provides the foundational building blocks for the exclusivity
//! runtime:
//!
//! - **Access Flags**: The flags word compiled code passes to the access
//!   entry points (action bit + nontracked bit)
//! - **Error Handling**: Structured diagnostic types for fatal runtime
//!   conditions

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flags;

pub use error::{TrackerError, TrackerResult};
pub use flags::{AccessAction, AccessFlags, ACTION_MASK};

/// Kestrel runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
