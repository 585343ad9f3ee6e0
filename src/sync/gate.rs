//! Reference-counted disposal guard.

use std::hint;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use crate::error::{Error, Result};

/// Tracks in-use borrowers of a natively-backed object so disposal can wait
/// for outstanding borrows to drain, and rejects new borrows once disposal
/// has begun.
///
/// The teardown election in [`begin_dispose`](BorrowGate::begin_dispose)
/// picks exactly one winner no matter how many threads race it; the loser
/// side is how a finalizing `Drop` coexists with an explicit close.
pub struct BorrowGate {
    borrows: AtomicUsize,
    disposed: AtomicBool,
}

/// Live borrow of the guarded object; released on drop through every exit
/// path.
pub struct BorrowToken<'a> {
    gate: &'a BorrowGate,
}

impl BorrowGate {
    pub const fn new() -> Self {
        Self {
            borrows: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Take out a borrow. Fails with [`Error::Disposed`] (naming `what`) once
    /// disposal has begun.
    pub fn borrow(&self, what: &'static str) -> Result<BorrowToken<'_>> {
        // Increment first so a racing disposer either sees the count and
        // waits, or we see its flag and back out.
        self.borrows.fetch_add(1, Ordering::Acquire);
        if self.disposed.load(Ordering::Acquire) {
            self.borrows.fetch_sub(1, Ordering::Release);
            return Err(Error::Disposed(what));
        }
        Ok(BorrowToken { gate: self })
    }

    /// Mark the object disposed and wait for outstanding borrows to finish.
    ///
    /// Returns `true` for exactly one caller across all threads and calls;
    /// that caller performs the real teardown. Later callers get `false`
    /// immediately, without waiting.
    pub fn begin_dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut spins = 0u32;
        while self.borrows.load(Ordering::Acquire) != 0 {
            spins += 1;
            if spins < 64 {
                hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for BorrowGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BorrowToken<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorrowToken").finish_non_exhaustive()
    }
}

impl Drop for BorrowToken<'_> {
    fn drop(&mut self) {
        self.gate.borrows.fetch_sub(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn borrow_and_release() {
        let gate = BorrowGate::new();
        {
            let _a = gate.borrow("thing").expect("borrow");
            let _b = gate.borrow("thing").expect("second borrow");
        }
        assert!(gate.begin_dispose());
    }

    #[test]
    fn borrow_after_dispose_fails() {
        let gate = BorrowGate::new();
        assert!(gate.begin_dispose());
        let err = gate.borrow("chunk").unwrap_err();
        assert_eq!(err, Error::Disposed("chunk"));
    }

    #[test]
    fn dispose_is_elected_exactly_once() {
        let gate = Arc::new(BorrowGate::new());
        let barrier = Arc::new(Barrier::new(8));
        let wins = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    barrier.wait();
                    if gate.begin_dispose() {
                        wins.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread panicked");
        }
        assert_eq!(wins.load(Ordering::Relaxed), 1);
        // Calling again later is still a no-op.
        assert!(!gate.begin_dispose());
    }

    #[test]
    fn dispose_waits_for_outstanding_borrows() {
        let gate = Arc::new(BorrowGate::new());
        let token_gate = Arc::clone(&gate);
        let barrier = Arc::new(Barrier::new(2));
        let barrier2 = Arc::clone(&barrier);

        let holder = thread::spawn(move || {
            let token = token_gate.borrow("thing").expect("borrow");
            barrier2.wait();
            thread::sleep(std::time::Duration::from_millis(50));
            drop(token);
        });

        barrier.wait();
        let start = std::time::Instant::now();
        assert!(gate.begin_dispose());
        // The disposer must have waited out the sleeping borrower.
        assert!(start.elapsed() >= std::time::Duration::from_millis(40));
        holder.join().expect("holder panicked");
    }
}
