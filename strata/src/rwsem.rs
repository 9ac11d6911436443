//! A reader/writer lock that is always taken under a [`LockSubclass`].
//!
//! [`Rwsem`] wraps a `parking_lot` lock with three additions:
//!
//! 1. Every acquisition names a subclass, and debug builds reject acquisitions that break the
//!    subclass ordering of the lock's [`LockClass`].
//! 2. A write guard can be downgraded to a read guard atomically: no other writer can get in
//!    between.
//! 3. Debug-only assertions over the lock state: any lock held, write lock held, no waiters.
//!
//! The lock is not re-entrant. Acquisition blocks without timeout.

use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_core::{LockClass, LockSubclass};

use crate::lock_order::Held;

/// State protected by an [`Rwsem`].
pub trait LockedState {
    /// Check the invariants that readers rely on. Called in debug builds whenever a write guard
    /// is released or downgraded, i.e. right before readers may observe the state.
    fn assert_consistent(&self) {}
}

/// A reader/writer lock with subclass-checked acquisition.
pub struct Rwsem<T> {
    lock: RwLock<T>,
    waiters: AtomicUsize,
    class: LockClass,
}

impl<T: LockedState> Rwsem<T> {
    pub fn new(class: LockClass, value: T) -> Self {
        Rwsem {
            lock: RwLock::new(value),
            waiters: AtomicUsize::new(0),
            class,
        }
    }

    pub fn class(&self) -> LockClass {
        self.class
    }

    /// Acquire a shared lock under `subclass`, blocking while a writer holds it.
    pub fn read_nested(&self, subclass: LockSubclass) -> RwsemReadGuard<'_, T> {
        let held = Held::acquire(self.class, subclass);
        let guard = match self.lock.try_read() {
            Some(guard) => guard,
            None => {
                self.waiters.fetch_add(1, Ordering::Relaxed);
                let guard = self.lock.read();
                self.waiters.fetch_sub(1, Ordering::Relaxed);
                guard
            }
        };
        RwsemReadGuard { guard, _held: held }
    }

    /// Acquire the exclusive lock under `subclass`, blocking while anybody else holds it.
    pub fn write_nested(&self, subclass: LockSubclass) -> RwsemWriteGuard<'_, T> {
        let held = Held::acquire(self.class, subclass);
        let guard = match self.lock.try_write() {
            Some(guard) => guard,
            None => {
                self.waiters.fetch_add(1, Ordering::Relaxed);
                let guard = self.lock.write();
                self.waiters.fetch_sub(1, Ordering::Relaxed);
                guard
            }
        };
        RwsemWriteGuard {
            guard: Some(guard),
            held: Some(held),
        }
    }

    /// Access the state without locking. Exclusive access to the lock itself proves that nobody
    /// holds or waits for it.
    pub fn get_mut(&mut self) -> &mut T {
        self.lock.get_mut()
    }

    /// The number of threads currently blocked acquiring this lock.
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn is_write_locked(&self) -> bool {
        self.lock.is_locked_exclusive()
    }

    /// Debug assertion: the lock is held in some mode.
    ///
    /// This does not tell which thread holds it.
    pub fn must_any_lock(&self) {
        debug_assert!(self.is_locked(), "{} lock is not held", self.class);
    }

    /// Debug assertion: the lock is held for writing.
    pub fn must_write_lock(&self) {
        debug_assert!(self.is_write_locked(), "{} lock is not write-locked", self.class);
    }

    /// Debug assertion: nobody is queued on the lock.
    pub fn must_no_waiters(&self) {
        debug_assert_eq!(self.waiters(), 0, "{} lock has waiters", self.class);
    }

    /// The address of the protected state, for matching guards to their lock.
    pub(crate) fn data_ptr(&self) -> *const T {
        self.lock.data_ptr()
    }
}

/// Shared access to the state of an [`Rwsem`]. Dropping it unlocks.
pub struct RwsemReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    _held: Held,
}

impl<'a, T> Deref for RwsemReadGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

/// Exclusive access to the state of an [`Rwsem`]. Dropping it unlocks.
pub struct RwsemWriteGuard<'a, T: LockedState> {
    // Both are `Some` until `downgrade` moves them out.
    guard: Option<RwLockWriteGuard<'a, T>>,
    held: Option<Held>,
}

impl<'a, T: LockedState> RwsemWriteGuard<'a, T> {
    /// Convert into a read guard without releasing the lock. The subclass registration carries
    /// over unchanged.
    pub fn downgrade(mut self) -> RwsemReadGuard<'a, T> {
        let (Some(guard), Some(held)) = (self.guard.take(), self.held.take()) else {
            unreachable!("write guard already downgraded");
        };
        if cfg!(debug_assertions) {
            guard.assert_consistent();
        }
        RwsemReadGuard {
            guard: RwLockWriteGuard::downgrade(guard),
            _held: held,
        }
    }
}

impl<'a, T: LockedState> Deref for RwsemWriteGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.guard {
            Some(ref guard) => guard,
            None => unreachable!("write guard already downgraded"),
        }
    }
}

impl<'a, T: LockedState> DerefMut for RwsemWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.guard {
            Some(ref mut guard) => guard,
            None => unreachable!("write guard already downgraded"),
        }
    }
}

impl<'a, T: LockedState> Drop for RwsemWriteGuard<'a, T> {
    fn drop(&mut self) {
        if let Some(ref guard) = self.guard {
            if cfg!(debug_assertions) && !std::thread::panicking() {
                guard.assert_consistent();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    /// Two halves that writers always keep equal.
    #[derive(Default)]
    struct Pair {
        a: u64,
        b: u64,
    }

    impl LockedState for Pair {
        fn assert_consistent(&self) {
            assert_eq!(self.a, self.b);
        }
    }

    #[test]
    fn readers_share_the_lock() {
        let sem = Rwsem::new(LockClass::Inode, Pair::default());
        let r1 = sem.read_nested(LockSubclass::Child);
        let r2 = sem.read_nested(LockSubclass::Parent);
        sem.must_any_lock();
        assert!(!sem.is_write_locked());
        assert_eq!(r1.a + r2.b, 0);
    }

    #[test]
    fn write_then_downgrade_keeps_the_lock() {
        let sem = Rwsem::new(LockClass::Inode, Pair::default());
        let mut w = sem.write_nested(LockSubclass::Child);
        sem.must_write_lock();
        w.a = 7;
        w.b = 7;
        let r = w.downgrade();
        assert!(sem.is_locked());
        assert!(!sem.is_write_locked());
        assert_eq!(r.a, 7);
        drop(r);
        assert!(!sem.is_locked());
    }

    #[test]
    fn blocked_acquirers_are_counted() {
        let sem = Arc::new(Rwsem::new(LockClass::Inode, Pair::default()));
        let w = sem.write_nested(LockSubclass::Child);

        let reader = thread::spawn({
            let sem = sem.clone();
            move || {
                let r = sem.read_nested(LockSubclass::Child);
                r.a
            }
        });

        while sem.waiters() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(sem.waiters(), 1);
        drop(w);
        assert_eq!(reader.join().unwrap(), 0);
        sem.must_no_waiters();
    }

    #[test]
    fn downgrade_admits_no_writer_in_between() {
        for _ in 0..64 {
            let sem = Arc::new(Rwsem::new(LockClass::Inode, Pair::default()));
            let barrier = Arc::new(Barrier::new(2));

            let writer = thread::spawn({
                let sem = sem.clone();
                let barrier = barrier.clone();
                move || {
                    barrier.wait();
                    let mut w = sem.write_nested(LockSubclass::Child);
                    let seen = (w.a, w.b);
                    w.a += 100;
                    w.b += 100;
                    seen
                }
            });

            let mut w = sem.write_nested(LockSubclass::Child);
            barrier.wait();
            w.a = 1;
            thread::yield_now();
            w.b = 1;
            let r = w.downgrade();
            // the other writer cannot have run yet.
            assert_eq!((r.a, r.b), (1, 1));
            drop(r);

            let seen = writer.join().unwrap();
            assert_eq!(seen, (1, 1));
            let r = sem.read_nested(LockSubclass::Child);
            assert_eq!((r.a, r.b), (101, 101));
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn torn_state_is_caught_on_unlock() {
        let sem = Rwsem::new(LockClass::Inode, Pair::default());
        let mut w = sem.write_nested(LockSubclass::Child);
        w.a = 1;
    }
}
