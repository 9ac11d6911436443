//! Grace periods for deferred reclamation.
//!
//! A [`GraceDomain`] schedules drops on the process-wide epoch collector and counts the ones it
//! still owes. Lock-free readers [`pin`](GraceDomain::pin) the domain for as long as they
//! dereference shared objects; an object handed to [`GraceDomain::defer_drop`] is dropped only
//! once every reader pinned at that moment has unpinned.
//!
//! Pinning goes through the calling thread's cached collector handle, so it costs no allocation.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam::epoch::{self, Guard};

/// A grace-period scheduler. Cheap to clone; clones share the pending count.
#[derive(Clone)]
pub struct GraceDomain {
    pending: Arc<AtomicUsize>,
}

impl GraceDomain {
    pub fn new() -> Self {
        GraceDomain {
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enter a read-side critical section. Anything loaded under the guard stays valid until the
    /// guard is dropped.
    pub fn pin(&self) -> Guard {
        epoch::pin()
    }

    /// Whether `guard` holds back this domain's grace periods. Guards of other collectors, and
    /// unprotected ones, do not.
    pub fn owns(&self, guard: &Guard) -> bool {
        guard.collector() == Some(epoch::default_collector())
    }

    /// Drop `value` after a grace period.
    pub fn defer_drop<V: Send + 'static>(&self, value: V) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let pending = self.pending.clone();
        let guard = self.pin();
        guard.defer(move || {
            drop(value);
            pending.fetch_sub(1, Ordering::AcqRel);
        });
        guard.flush();
    }

    /// The number of deferred drops that have not run yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until every deferred drop scheduled so far has run.
    ///
    /// # Deadlocks
    ///
    /// Never returns while the calling thread is pinned, and waits for as long as any other
    /// thread stays pinned. All domains share one collector, so this includes readers of other
    /// domains.
    pub fn barrier(&self) {
        let mut rounds = 0u64;
        while self.pending() > 0 {
            self.pin().flush();
            rounds += 1;
            if rounds % 1024 == 0 {
                log::trace!(
                    "grace barrier: {} drops pending after {} rounds",
                    self.pending(),
                    rounds
                );
            }
            std::thread::yield_now();
        }
    }

    /// Like [`GraceDomain::barrier`], but gives up after `max_rounds` collection attempts.
    /// Returns whether everything ran.
    pub fn try_barrier(&self, max_rounds: usize) -> bool {
        for _ in 0..max_rounds {
            if self.pending() == 0 {
                return true;
            }
            self.pin().flush();
        }
        self.pending() == 0
    }
}

impl Default for GraceDomain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_waits_for_pinned_readers() {
        let domain = GraceDomain::new();
        let dropped = Arc::new(AtomicBool::new(false));

        let reader = domain.pin();
        domain.defer_drop(SetOnDrop(dropped.clone()));
        assert_eq!(domain.pending(), 1);

        // the reader is still pinned: no amount of collection may run the drop.
        assert!(!domain.try_barrier(256));
        assert!(!dropped.load(Ordering::SeqCst));

        drop(reader);
        domain.barrier();
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(domain.pending(), 0);
    }

    #[test]
    fn pins_use_the_thread_handle() {
        let domain = GraceDomain::new();
        let outer = domain.pin();
        assert!(epoch::is_pinned());
        let inner = domain.pin();
        assert!(domain.owns(&inner));
        drop(inner);
        // nested pins share one handle: dropping the inner one leaves the thread pinned.
        assert!(epoch::is_pinned());
        drop(outer);
        assert!(!epoch::is_pinned());
    }

    #[test]
    fn foreign_guards_are_not_owned() {
        let domain = GraceDomain::new();
        let other = epoch::Collector::new();
        assert!(!domain.owns(&other.register().pin()));
        // SAFETY: the guard is only inspected.
        assert!(!domain.owns(unsafe { epoch::unprotected() }));
        assert!(domain.owns(&epoch::pin()));
    }

    #[test]
    fn barrier_without_pending_work_returns() {
        let domain = GraceDomain::default();
        domain.barrier();
        assert!(domain.try_barrier(0));
    }

    #[test]
    fn clones_share_pending_work() {
        let domain = GraceDomain::new();
        let clone = domain.clone();
        clone.defer_drop(vec![0u8; 32]);
        domain.barrier();
        assert_eq!(clone.pending(), 0);
    }
}
