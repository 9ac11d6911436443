//! Per-thread tracking of held lock subclasses.
//!
//! In debug builds every acquisition is checked against the subclasses the current thread
//! already holds in the same [`LockClass`]: the new subclass must be strictly greater than all of
//! them. Release builds compile the tracker away.

use std::marker::PhantomData;

use strata_core::{LockClass, LockSubclass};

/// Proof that the current thread registered a subclass acquisition. Dropping it unregisters.
///
/// Not `Send`: the registration lives in the acquiring thread's tracker.
pub(crate) struct Held {
    class: LockClass,
    subclass: LockSubclass,
    _not_send: PhantomData<*const ()>,
}

impl Held {
    /// Register an acquisition of `subclass` in `class` by the current thread.
    ///
    /// Call before blocking on the lock so that an out-of-order acquisition is reported instead
    /// of deadlocking.
    pub(crate) fn acquire(class: LockClass, subclass: LockSubclass) -> Self {
        imp::acquire(class, subclass);
        Held {
            class,
            subclass,
            _not_send: PhantomData,
        }
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        imp::release(self.class, self.subclass);
    }
}

/// The subclasses of `class` currently held by this thread, as a bit mask. Always zero in
/// release builds.
pub fn held_mask(class: LockClass) -> u8 {
    imp::held_mask(class)
}

cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        mod imp {
            use std::cell::Cell;
            use strata_core::{LockClass, LockSubclass};

            thread_local! {
                static HELD: [Cell<u8>; LockClass::COUNT] = const { [Cell::new(0), Cell::new(0)] };
            }

            pub(super) fn acquire(class: LockClass, subclass: LockSubclass) {
                HELD.with(|held| {
                    let mask = &held[class.index()];
                    let current = mask.get();
                    // every held bit must sit strictly below the new one.
                    if current >> subclass.index() != 0 {
                        let held: Vec<&str> = LockSubclass::ALL
                            .iter()
                            .filter(|held| current & held.bit() != 0)
                            .map(|held| held.name())
                            .collect();
                        panic!(
                            "lock order violation: {} {} acquired while holding {}",
                            class,
                            subclass,
                            held.join(", "),
                        );
                    }
                    mask.set(current | subclass.bit());
                });
            }

            pub(super) fn release(class: LockClass, subclass: LockSubclass) {
                HELD.with(|held| {
                    let mask = &held[class.index()];
                    debug_assert!(mask.get() & subclass.bit() != 0);
                    mask.set(mask.get() & !subclass.bit());
                });
            }

            pub(super) fn held_mask(class: LockClass) -> u8 {
                HELD.with(|held| held[class.index()].get())
            }
        }
    } else {
        mod imp {
            use strata_core::{LockClass, LockSubclass};

            #[inline(always)]
            pub(super) fn acquire(_: LockClass, _: LockSubclass) {}

            #[inline(always)]
            pub(super) fn release(_: LockClass, _: LockSubclass) {}

            #[inline(always)]
            pub(super) fn held_mask(_: LockClass) -> u8 {
                0
            }
        }
    }
}
