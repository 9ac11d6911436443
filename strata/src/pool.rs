//! Typed object pools with size-driven reclamation.
//!
//! An [`ObjectPool`] keeps constructed objects on a free list. Objects are built with
//! [`Poolable::construct`] when the pool grows and restored with [`Poolable::recycle`] each time
//! they come back, so expensive one-time setup (the embedded lock) survives reuse.
//!
//! Freeing follows the kind's [`FreePolicy`]: objects large enough to carry deferral bookkeeping
//! return to the free list after a grace period of the pool's [`GraceDomain`]; smaller ones
//! return immediately. Only deferred kinds may be dereferenced by lock-free readers.

use std::{
    alloc::Layout,
    mem::{self, ManuallyDrop},
    ops::{Deref, DerefMut},
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use crossbeam::epoch::Guard;
use parking_lot::Mutex;
use strata_core::{FreePolicy, ObjectKind};

use crate::{
    error::AllocError,
    grace::GraceDomain,
    metrics::{Metric, Metrics},
};

/// An object kind that can live in an [`ObjectPool`].
pub trait Poolable: Sized + Send + 'static {
    /// The kind tag, used in errors and logs.
    const KIND: ObjectKind;

    /// How freed objects return to the pool. [`FreePolicy::Conditional`] is resolved against
    /// the object's size.
    const POLICY: FreePolicy;

    /// Build an object in its pooled state. Runs once per object, when the pool grows.
    fn construct() -> Self;

    /// Bring a freed object back to the state [`Poolable::construct`] left it in.
    fn recycle(&mut self);
}

/// A pool of `T` objects. Cheap to clone; clones share the free list.
pub struct ObjectPool<T: Poolable> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Poolable> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        ObjectPool {
            inner: self.inner.clone(),
        }
    }
}

struct PoolInner<T> {
    freelist: Mutex<Vec<Box<T>>>,
    live: AtomicUsize,
    limit: Option<usize>,
    grow_batch: usize,
    grace: GraceDomain,
    metrics: Metrics,
}

impl<T: Poolable> PoolInner<T> {
    /// Restore an object and put it on the free list.
    ///
    /// # Safety
    ///
    /// `ptr` must come from a `Box<T>` handed out by this pool, and nothing may reference it any
    /// more.
    unsafe fn recycle(&self, ptr: NonNull<T>) {
        let mut object = Box::from_raw(ptr.as_ptr());
        object.recycle();
        self.freelist.lock().push(object);
    }
}

impl<T: Poolable> ObjectPool<T> {
    /// Create an empty pool.
    ///
    /// `grow_batch` objects are constructed whenever the free list runs dry. With a `limit`, at
    /// most that many objects are live at once.
    pub fn new(
        grace: GraceDomain,
        metrics: Metrics,
        grow_batch: usize,
        limit: Option<usize>,
    ) -> Self {
        assert!(grow_batch > 0);
        ObjectPool {
            inner: Arc::new(PoolInner {
                freelist: Mutex::new(Vec::new()),
                live: AtomicUsize::new(0),
                limit,
                grow_batch,
                grace,
                metrics,
            }),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        T::KIND
    }

    /// The resolved free policy: never [`FreePolicy::Conditional`].
    pub fn policy(&self) -> FreePolicy {
        T::POLICY.resolve(mem::size_of::<T>())
    }

    pub fn grace(&self) -> &GraceDomain {
        &self.inner.grace
    }

    /// Enter a read-side critical section of the pool's grace domain.
    pub fn pin(&self) -> Guard {
        self.inner.grace.pin()
    }

    /// Whether both handles refer to the same pool.
    pub fn same(&self, other: &ObjectPool<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Objects handed out and not yet freed.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Objects sitting on the free list.
    pub fn idle(&self) -> usize {
        self.inner.freelist.lock().len()
    }

    /// Take an object from the pool. It is in its constructed state.
    ///
    /// Fails without retrying if the pool is at its limit or the allocator refuses to grow it.
    pub fn alloc(&self) -> Result<Pooled<T>, AllocError> {
        let inner = &self.inner;
        if let Some(limit) = inner.limit {
            let reserved = inner
                .live
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < limit).then_some(n + 1)
                });
            if reserved.is_err() {
                log::warn!("{} pool exhausted at {} live objects", T::KIND, limit);
                inner.metrics.count(Metric::AllocFailures);
                return Err(AllocError::PoolExhausted {
                    kind: T::KIND,
                    limit,
                });
            }
        } else {
            inner.live.fetch_add(1, Ordering::AcqRel);
        }

        let popped = inner.freelist.lock().pop();
        let object = match popped {
            Some(object) => object,
            None => match self.grow() {
                Ok(object) => object,
                Err(err) => {
                    inner.live.fetch_sub(1, Ordering::AcqRel);
                    inner.metrics.count(Metric::AllocFailures);
                    return Err(err);
                }
            },
        };

        inner.metrics.count(Metric::Allocs);
        Ok(Pooled {
            ptr: NonNull::from(Box::leak(object)),
            pool: self.clone(),
        })
    }

    /// Return an object to the pool according to the kind's policy.
    ///
    /// Dropping a [`Pooled`] does the same.
    ///
    /// # Panics
    ///
    /// Panics if the object belongs to another pool.
    pub fn free(&self, object: Pooled<T>) {
        assert!(self.same(&object.pool), "{} object freed to a foreign pool", T::KIND);
        drop(object);
    }

    /// Return an object to the free list right away, skipping any grace period.
    ///
    /// Only for objects that were never reachable by lock-free readers, e.g. when initialization
    /// failed before the object was published.
    pub fn free_now(&self, object: Pooled<T>) {
        assert!(self.same(&object.pool), "{} object freed to a foreign pool", T::KIND);
        let (ptr, _pool) = object.into_raw();
        self.inner.live.fetch_sub(1, Ordering::AcqRel);
        self.inner.metrics.count(Metric::ImmediateFrees);
        // SAFETY: the pointer came from a `Pooled` of this pool, which we consumed.
        unsafe { self.inner.recycle(ptr) }
    }

    /// Wait until every deferred free scheduled so far has returned its object to a free list.
    ///
    /// See [`GraceDomain::barrier`] for the blocking rules.
    pub fn synchronize(&self) {
        let _timer = self.inner.metrics.record(Metric::BarrierWaitTime);
        self.inner.grace.barrier();
    }

    fn release(&self, ptr: NonNull<T>) {
        let inner = &self.inner;
        inner.live.fetch_sub(1, Ordering::AcqRel);
        if self.policy() == FreePolicy::Immediate {
            inner.metrics.count(Metric::ImmediateFrees);
            // SAFETY: called once, from the drop of the `Pooled` that owned `ptr`.
            unsafe { inner.recycle(ptr) }
        } else {
            inner.metrics.count(Metric::DeferredFrees);
            log::trace!("deferring free of {} object {:p}", T::KIND, ptr);
            inner.grace.defer_drop(Parked {
                ptr,
                pool: Arc::downgrade(inner),
            });
        }
    }

    fn grow(&self) -> Result<Box<T>, AllocError> {
        let first = try_box(T::construct())?;

        let mut built = Vec::new();
        if built.try_reserve_exact(self.inner.grow_batch - 1).is_ok() {
            for _ in 1..self.inner.grow_batch {
                match try_box(T::construct()) {
                    Ok(object) => built.push(object),
                    Err(_) => break,
                }
            }
        }

        log::debug!("grew {} pool by {} objects", T::KIND, built.len() + 1);
        self.inner.metrics.count(Metric::PoolGrowths);
        self.inner.freelist.lock().extend(built);
        Ok(first)
    }
}

/// Box `value` without aborting when the allocator fails.
fn try_box<T>(value: T) -> Result<Box<T>, AllocError> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }
    // SAFETY: the layout has a non-zero size.
    let ptr = unsafe { std::alloc::alloc(layout) } as *mut T;
    if ptr.is_null() {
        return Err(AllocError::OutOfMemory {
            size: layout.size(),
        });
    }
    // SAFETY: `ptr` is a fresh allocation with the global allocator and the layout of `T`, which
    //         is exactly what `Box` owns.
    unsafe {
        ptr.write(value);
        Ok(Box::from_raw(ptr))
    }
}

/// A freed object waiting for its grace period. Dropping it performs the return.
struct Parked<T: Poolable> {
    ptr: NonNull<T>,
    pool: Weak<PoolInner<T>>,
}

// SAFETY: a parked object is owned by nobody else, and `T: Send`.
unsafe impl<T: Poolable> Send for Parked<T> {}

impl<T: Poolable> Drop for Parked<T> {
    fn drop(&mut self) {
        match self.pool.upgrade() {
            // SAFETY: the object was unreachable when parked and the grace period has passed.
            Some(pool) => unsafe { pool.recycle(self.ptr) },
            // the pool is gone: give the memory back to the allocator.
            None => drop(unsafe { Box::from_raw(self.ptr.as_ptr()) }),
        }
    }
}

/// An object taken from an [`ObjectPool`]. Dropping it frees it back to the pool.
pub struct Pooled<T: Poolable> {
    ptr: NonNull<T>,
    pool: ObjectPool<T>,
}

// SAFETY: `Pooled` owns its object exclusively, like a `Box`.
unsafe impl<T: Poolable> Send for Pooled<T> {}
// SAFETY: shared access to `Pooled` only hands out `&T`.
unsafe impl<T: Poolable + Sync> Sync for Pooled<T> {}

impl<T: Poolable> Pooled<T> {
    pub fn pool(&self) -> &ObjectPool<T> {
        &self.pool
    }

    /// Give up ownership without freeing.
    pub(crate) fn into_raw(self) -> (NonNull<T>, ObjectPool<T>) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the pool handle is moved out exactly once.
        let pool = unsafe { std::ptr::read(&this.pool) };
        (this.ptr, pool)
    }

    /// Take ownership back from [`Pooled::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` and `pool` must come from a single `into_raw` call, and nothing else may own `ptr`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, pool: ObjectPool<T>) -> Self {
        Pooled { ptr, pool }
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the object lives until this handle is dropped.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the handle is the unique owner.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        self.pool.release(self.ptr);
    }
}
