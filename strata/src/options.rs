/// Options when creating a [`crate::Caches`] instance.
#[derive(Clone, Debug)]
pub struct Options {
    /// The largest branch table an entity may be initialized with.
    pub(crate) max_branches: usize,
    /// How many objects a pool constructs at once when its free list runs dry.
    pub(crate) grow_batch: usize,
    /// The maximum number of live inode containers, if any.
    pub(crate) inode_limit: Option<usize>,
    /// The maximum number of live dentry infos, if any.
    pub(crate) dentry_limit: Option<usize>,
    /// Enable or disable metrics collection.
    pub(crate) metrics: bool,
}

impl Options {
    /// Create a new `Options` instance with the default values.
    pub fn new() -> Self {
        Self {
            max_branches: 127,
            grow_batch: 64,
            inode_limit: None,
            dentry_limit: None,
            metrics: false,
        }
    }

    /// Set the largest number of branches an entity may be initialized with.
    ///
    /// Must be more than 0.
    ///
    /// Default: 127.
    pub fn max_branches(&mut self, max_branches: usize) {
        assert!(max_branches > 0);
        self.max_branches = max_branches;
    }

    /// Set the number of objects constructed whenever a pool grows.
    ///
    /// Must be more than 0.
    ///
    /// Default: 64.
    pub fn grow_batch(&mut self, grow_batch: usize) {
        assert!(grow_batch > 0);
        self.grow_batch = grow_batch;
    }

    /// Cap the number of live inode containers. Allocations past the cap fail with
    /// [`crate::AllocError::PoolExhausted`].
    ///
    /// Default: unlimited.
    pub fn inode_limit(&mut self, limit: usize) {
        self.inode_limit = Some(limit);
    }

    /// Cap the number of live dentry infos.
    ///
    /// Default: unlimited.
    pub fn dentry_limit(&mut self, limit: usize) {
        self.dentry_limit = Some(limit);
    }

    /// Set metrics collection on or off.
    ///
    /// Default: off.
    pub fn metrics(&mut self, metrics: bool) {
        self.metrics = metrics;
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
