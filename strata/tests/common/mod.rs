use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use strata::{Caches, HostEntity, Options};

/// Counts how many references of one branch are held.
pub struct Branch {
    id: usize,
    refs: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl Branch {
    pub fn new(id: usize) -> Self {
        Branch {
            id,
            refs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Take a counted reference, as the hosting filesystem would before handing it over.
    pub fn get(&self) -> BranchRef {
        self.refs.fetch_add(1, Ordering::SeqCst);
        BranchRef {
            id: self.id,
            refs: self.refs.clone(),
        }
    }

    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }
}

/// A held reference on a [`Branch`]. Dropping it releases the reference.
pub struct BranchRef {
    id: usize,
    refs: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl BranchRef {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for BranchRef {
    fn drop(&mut self) {
        let prev = self.refs.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > 0, "branch {} released more often than acquired", self.id);
    }
}

/// A host inode that can be marked bad from outside.
#[allow(dead_code)]
#[derive(Default)]
pub struct Host {
    pub bad: AtomicBool,
}

impl HostEntity for Host {
    fn is_bad(&self) -> bool {
        self.bad.load(Ordering::Acquire)
    }
}

#[allow(dead_code)]
pub type TestCaches = Caches<Host, BranchRef>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn caches(grow_batch: usize) -> TestCaches {
    init_logging();
    let mut o = Options::new();
    o.grow_batch(grow_batch);
    o.metrics(true);
    Caches::new(&o)
}
