//! Thread-affine lock: mutual exclusion optimized for an object read
//! repeatedly by one thread and occasionally disposed by another.

use std::hint;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// One thread's claim on the lock. The active ticket stays in residence
/// across critical sections, which is what makes redundant re-entry by the
/// same thread cheap: no read-modify-write on the hot word.
struct Ticket {
    /// `None` only for the trashed sentinel.
    owner: Option<ThreadId>,
    locked: AtomicBool,
}

/// Terminal slot value: the lock has been disposed.
static TRASHED: Ticket = Ticket {
    owner: None,
    locked: AtomicBool::new(false),
};

fn trashed() -> *mut Ticket {
    &TRASHED as *const Ticket as *mut Ticket
}

/// Mutual exclusion with a fast path for the thread that last held the lock.
///
/// State machine of the active-ticket slot:
/// - null: never locked;
/// - a live ticket: bound to one thread, `locked` flag marks the critical
///   section;
/// - the trashed sentinel: disposed, every later [`enter`](Self::enter)
///   fails.
///
/// Entering from the resident thread is one flag store and one re-read of
/// the slot, no read-modify-write. Both sides of the hand-off race are
/// sequentially consistent, Dekker style: the resident's flag store cannot
/// pass its slot re-read, and a foreign thread's slot swap cannot pass its
/// read of the flag, so one of the two always observes the other. Exit is a
/// single release store.
pub struct ThreadAffineLock {
    active: AtomicPtr<Ticket>,
    /// Replaced tickets parked until the lock drops. A fast-path reader may
    /// dereference a ticket that has just been swapped out, so tickets must
    /// stay allocated for the lock's whole lifetime.
    retired: Mutex<Vec<Box<Ticket>>>,
    /// Object name used in disposed errors.
    what: &'static str,
}

/// Critical-section guard; clears the ticket's locked flag on drop.
pub struct AffineGuard<'a> {
    ticket: *mut Ticket,
    _lock: &'a ThreadAffineLock,
    // Tickets are bound to the entering thread.
    _not_send: PhantomData<*mut ()>,
}

impl ThreadAffineLock {
    pub fn new(what: &'static str) -> Self {
        Self {
            active: AtomicPtr::new(ptr::null_mut()),
            retired: Mutex::new(Vec::new()),
            what,
        }
    }

    /// Enter the critical section.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] once [`begin_dispose`](Self::begin_dispose) has
    /// run on any thread.
    pub fn enter(&self) -> Result<AffineGuard<'_>> {
        let me = thread::current().id();
        let active = self.active.load(Ordering::Acquire);
        if !active.is_null() && !ptr::eq(active, trashed()) {
            // Tickets in the slot are kept alive until the lock drops.
            let ticket = unsafe { &*active };
            if ticket.owner == Some(me) {
                debug_assert!(
                    !ticket.locked.load(Ordering::Relaxed),
                    "thread-affine lock re-entered while held"
                );
                // SeqCst store then SeqCst load: the flag publish is globally
                // visible before the slot re-read, so a racing hand-off
                // either sees the flag and waits, or we see the new ticket
                // and back out. Anything weaker readmits store-load
                // reordering and two threads in the section.
                ticket.locked.store(true, Ordering::SeqCst);
                if ptr::eq(self.active.load(Ordering::SeqCst), active) {
                    return Ok(AffineGuard {
                        ticket: active,
                        _lock: self,
                        _not_send: PhantomData,
                    });
                }
                // Another thread took the slot between our loads; back out.
                ticket.locked.store(false, Ordering::Release);
            }
        }
        self.enter_slow(me)
    }

    /// First use, or the slot belongs to another thread: install a fresh
    /// ticket and synchronously wait out the previous holder.
    fn enter_slow(&self, me: ThreadId) -> Result<AffineGuard<'_>> {
        let ticket = Box::into_raw(Box::new(Ticket {
            owner: Some(me),
            locked: AtomicBool::new(true),
        }));
        let mut observed = self.active.load(Ordering::Acquire);
        loop {
            if ptr::eq(observed, trashed()) {
                // Never published; safe to free immediately.
                drop(unsafe { Box::from_raw(ticket) });
                return Err(Error::Disposed(self.what));
            }
            match self.active.compare_exchange(
                observed,
                ticket,
                // The swap must order ahead of the wait below; see `enter`.
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(prev) => {
                    if !prev.is_null() {
                        wait_unlocked(unsafe { &*prev });
                        self.retired.lock().push(unsafe { Box::from_raw(prev) });
                    }
                    return Ok(AffineGuard {
                        ticket,
                        _lock: self,
                        _not_send: PhantomData,
                    });
                }
                Err(actual) => {
                    observed = actual;
                    hint::spin_loop();
                }
            }
        }
    }

    /// Swap the trashed sentinel into the slot, waiting out a live holder on
    /// another thread.
    ///
    /// Returns `true` for exactly one caller across all threads; that caller
    /// performs the real teardown of the guarded object. Later calls return
    /// `false` (already disposed).
    pub fn begin_dispose(&self) -> bool {
        let prev = self.active.swap(trashed(), Ordering::SeqCst);
        if ptr::eq(prev, trashed()) {
            return false;
        }
        if !prev.is_null() {
            let ticket = unsafe { &*prev };
            // Waiting on our own held ticket would deadlock; same-thread
            // dispose-while-held is the caller's contract to uphold.
            if ticket.owner != Some(thread::current().id()) {
                wait_unlocked(ticket);
            }
            self.retired.lock().push(unsafe { Box::from_raw(prev) });
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        ptr::eq(self.active.load(Ordering::Acquire), trashed())
    }
}

fn wait_unlocked(ticket: &Ticket) {
    let mut spins = 0u32;
    while ticket.locked.load(Ordering::SeqCst) {
        spins += 1;
        if spins < 128 {
            hint::spin_loop();
        } else {
            thread::yield_now();
        }
    }
}

impl Drop for ThreadAffineLock {
    fn drop(&mut self) {
        let active = *self.active.get_mut();
        if !active.is_null() && !ptr::eq(active, trashed()) {
            drop(unsafe { Box::from_raw(active) });
        }
    }
}

impl std::fmt::Debug for AffineGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffineGuard").finish_non_exhaustive()
    }
}

impl Drop for AffineGuard<'_> {
    fn drop(&mut self) {
        // Release pairs with the waiter's flag load, publishing anything
        // written inside the critical section to the next holder.
        unsafe { &*self.ticket }.locked.store(false, Ordering::Release);
    }
}
