//! Structural self-checks for layouts, field arrays, masks and vectors.
//!
//! `validate_invariants` is always available and returns the first violation.
//! `debug_assert_invariants` panics on a violation, but only in debug builds
//! or with the `check-invariants` / `strict-invariants` features; release
//! builds compile it to nothing.

use crate::state_error::StateVecError;

pub trait DebugInvariants {
    /// Panic on the first violation when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// First violated invariant, if any.
    fn validate_invariants(&self) -> Result<(), StateVecError>;
}

/// Run a fallible check and panic with `[invariants] <context>: <error>` when
/// invariant checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $check {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
