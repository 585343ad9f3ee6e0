//! Concurrency primitives backing native-handle lifetimes.
//!
//! The driver spawns no threads of its own; these primitives exist so that
//! handle disposal and concurrent reads stay memory-safe when callers share
//! objects across threads, without paying lock overhead on the steady-state
//! single-thread path.

mod affine;
mod gate;
mod seqlock;

pub use affine::{AffineGuard, ThreadAffineLock};
pub use gate::{BorrowGate, BorrowToken};
pub use seqlock::SeqCell;
