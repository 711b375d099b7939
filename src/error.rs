//! Error handling design.
//!
//! `OUT_OF_MEMORY` is the only error kind the core recovers from locally -- it surfaces
//! as `Err` from the handful of operations that can detect capacity-arithmetic overflow
//! up front ([`crate::storage::Table::dim`]). The other programming-error kinds
//! (`MORE_THAN_ONE_PREFAB`, `INVALID_HANDLE`, `INTERNAL_ERROR`) are raised via
//! `assert!`/`panic!` at the point of detection rather than as `Result` values: they must
//! terminate the process and are never meant to be caught and retried.

use std::fmt;

/// The one error kind the core can recover from locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A column or row-count allocation could not be satisfied.
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for Error {}
