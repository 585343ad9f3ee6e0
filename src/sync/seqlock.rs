//! Seqlock cell: lock-free tear-proof reads of a small `Copy` value.

use std::cell::UnsafeCell;
use std::hint;
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, Ordering};

/// A small fixed-layout value shared across threads without tearing.
///
/// Writers version the payload with an even/odd counter: odd while a write is
/// in flight, bumped to the next even number once the payload is fully
/// written. Readers snapshot the counter, copy the payload, and retry if the
/// counter moved or was odd. Readers never block; writers contend only with
/// each other.
///
/// The read side uses acquire loads on the version counter before and after
/// the payload copy, so the validation load cannot be reordered ahead of the
/// payload read.
pub struct SeqCell<T> {
    seq: AtomicU64,
    value: UnsafeCell<T>,
}

// Readers copy the payload concurrently with writes; the version counter is
// what makes the copy well-defined, so T must be Copy and Send.
unsafe impl<T: Copy + Send> Sync for SeqCell<T> {}
unsafe impl<T: Copy + Send> Send for SeqCell<T> {}

impl<T: Copy> SeqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            seq: AtomicU64::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Store a new value. Retries with backoff if another writer holds the
    /// odd version.
    pub fn write(&self, value: T) {
        let mut backoff = 1u32;
        loop {
            let seq = self.seq.load(Ordering::Relaxed);
            if seq & 1 == 0
                && self
                    .seq
                    .compare_exchange_weak(seq, seq + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                unsafe { ptr::write_volatile(self.value.get(), value) };
                self.seq.store(seq + 2, Ordering::Release);
                return;
            }
            for _ in 0..backoff {
                hint::spin_loop();
            }
            backoff = (backoff * 2).min(64);
        }
    }

    /// Read the current value. Never blocks; retries until a consistent
    /// snapshot is observed.
    pub fn read(&self) -> T {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                hint::spin_loop();
                continue;
            }
            let value = unsafe { ptr::read_volatile(self.value.get()) };
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return value;
            }
        }
    }
}

impl<T: Copy + Default> Default for SeqCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_thread_roundtrip() {
        let cell = SeqCell::new((0u64, 0u64));
        cell.write((7, 14));
        assert_eq!(cell.read(), (7, 14));
        cell.write((8, 16));
        assert_eq!(cell.read(), (8, 16));
    }

    #[test]
    fn readers_never_observe_torn_pairs() {
        // Writer publishes (i, 2*i); any torn read breaks the invariant.
        let cell = Arc::new(SeqCell::new((0u64, 0u64)));
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let (a, b) = cell.read();
                        assert_eq!(b, a * 2, "torn read: ({a}, {b})");
                    }
                })
            })
            .collect();

        for i in 1..20_000u64 {
            cell.write((i, i * 2));
        }
        stop.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().expect("reader panicked");
        }
    }

    #[test]
    fn concurrent_writers_stay_consistent() {
        let cell = Arc::new(SeqCell::new((1u64, 2u64)));
        let writers: Vec<_> = (1..=3u64)
            .map(|w| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for i in 0..5_000 {
                        let v = w * 10_000 + i;
                        cell.write((v, v * 2));
                    }
                })
            })
            .collect();
        for _ in 0..50_000 {
            let (a, b) = cell.read();
            assert_eq!(b, a * 2);
        }
        for w in writers {
            w.join().expect("writer panicked");
        }
    }
}
