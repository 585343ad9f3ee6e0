//! Driver error taxonomy.
//!
//! Every failure surfaces immediately to the caller; the driver performs no
//! retries or recovery of its own. The only silently-absorbed race is a
//! finalizing `Drop` colliding with an explicit close, which the disposal
//! primitives make idempotent.

use thiserror::Error;

use crate::types::{StorageKind, ValueKind};

/// Result type used across the driver.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Operation attempted on an object after disposal began.
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// The requested static type does not match the column's physical
    /// storage, or no conversion exists between the two.
    #[error("type mismatch: column is {kind:?} (stored as {storage:?}), requested {requested}")]
    TypeMismatch {
        kind: ValueKind,
        storage: StorageKind,
        requested: &'static str,
    },

    /// Column index, enum ordinal, struct member index, or row index outside
    /// the valid range, including calls against an unbound accessor.
    #[error("{what} index {index} out of bounds (len {len})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A caller-supplied argument the engine cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Failure reported by the engine itself, carrying its message text.
    #[error("engine error: {0}")]
    Engine(String),

    /// The engine runtime library could not be located, loaded, or resolved.
    #[error("runtime error: {0}")]
    Runtime(String),
}
