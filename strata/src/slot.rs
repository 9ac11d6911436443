//! A publication point for pooled objects read without locks.
//!
//! A [`SharedSlot`] holds at most one object behind an epoch-protected pointer. Readers pin the
//! slot's grace domain and [`load`](SharedSlot::load) a reference that stays valid until their
//! guard drops, even if the object is retired in the meantime. Retiring hands the object to its
//! pool's deferred free, which only recycles it once every such reader has unpinned.

use std::{ptr::NonNull, sync::atomic::Ordering};

use crossbeam::epoch::{Atomic, Guard, Shared};
use strata_core::FreePolicy;

use crate::pool::{ObjectPool, Poolable, Pooled};

/// A lock-free readable slot for one object of a deferred-free kind.
pub struct SharedSlot<T: Poolable + Sync> {
    ptr: Atomic<T>,
    pool: ObjectPool<T>,
}

impl<T: Poolable + Sync> SharedSlot<T> {
    /// Create an empty slot for objects of `pool`.
    ///
    /// # Panics
    ///
    /// Panics if the pool frees immediately: lock-free readers would be left dangling.
    pub fn new(pool: ObjectPool<T>) -> Self {
        assert_eq!(
            pool.policy(),
            FreePolicy::Deferred,
            "{} objects are freed immediately and cannot be read lock-free",
            T::KIND
        );
        SharedSlot {
            ptr: Atomic::null(),
            pool,
        }
    }

    /// Enter a read-side critical section for [`SharedSlot::load`].
    pub fn pin(&self) -> Guard {
        self.pool.pin()
    }

    /// Make `object` visible to readers. Gives it back if the slot is occupied.
    ///
    /// # Panics
    ///
    /// Panics if `object` comes from a different pool than the slot's.
    pub fn publish(&self, object: Pooled<T>) -> Result<(), Pooled<T>> {
        assert!(object.pool().same(&self.pool), "{} object from a foreign pool", T::KIND);
        let guard = self.pool.pin();
        let (ptr, pool) = object.into_raw();
        let new = Shared::from(ptr.as_ptr() as *const T);
        match self
            .ptr
            .compare_exchange(Shared::null(), new, Ordering::AcqRel, Ordering::Acquire, &guard)
        {
            Ok(_) => Ok(()),
            // SAFETY: the exchange failed, so `ptr` was never published and is still ours.
            Err(_) => Err(unsafe { Pooled::from_raw(ptr, pool) }),
        }
    }

    /// The published object, valid for as long as `guard` is held.
    ///
    /// # Panics
    ///
    /// Panics if `guard` does not hold back the pool's grace periods, e.g. a guard of another
    /// collector or an unprotected one.
    pub fn load<'g>(&self, guard: &'g Guard) -> Option<&'g T> {
        assert!(
            self.pool.grace().owns(guard),
            "{} slot loaded under a guard of a foreign collector",
            T::KIND
        );
        let shared = self.ptr.load(Ordering::Acquire, guard);
        // SAFETY: a published object is only freed through `retire`, which defers the free until
        //         every guard that could have loaded it is dropped.
        unsafe { shared.as_ref() }
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.pool.pin();
        self.ptr.load(Ordering::Acquire, &guard).is_null()
    }

    /// Unpublish the object and free it after a grace period. Returns whether there was one.
    pub fn retire(&self) -> bool {
        let guard = self.pool.pin();
        let old = self.ptr.swap(Shared::null(), Ordering::AcqRel, &guard).as_raw();
        drop(guard);

        let Some(ptr) = NonNull::new(old as *mut T) else {
            return false;
        };
        // SAFETY: the pointer was published from a `Pooled` of this pool and the swap made it
        //         unreachable for new readers. The drop defers the actual free.
        drop(unsafe { Pooled::from_raw(ptr, self.pool.clone()) });
        true
    }
}

impl<T: Poolable + Sync> Drop for SharedSlot<T> {
    fn drop(&mut self) {
        self.retire();
    }
}
