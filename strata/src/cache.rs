//! The pools of one mount: inode containers and dentry infos, under one grace domain.

use strata_core::ObjectKind;

use crate::{
    dentry::DentryInfo,
    error::AllocError,
    grace::GraceDomain,
    inode::{HostEntity, InodeContainer},
    metrics::Metrics,
    options::Options,
    pool::{ObjectPool, Pooled},
};

/// Both pools of a mount. Cheap to clone; clones share the pools.
pub struct Caches<N: HostEntity, B: Send + Sync + 'static> {
    inodes: ObjectPool<InodeContainer<N, B>>,
    dentries: ObjectPool<DentryInfo<B>>,
    grace: GraceDomain,
    metrics: Metrics,
    max_branches: usize,
}

impl<N: HostEntity, B: Send + Sync + 'static> Clone for Caches<N, B> {
    fn clone(&self) -> Self {
        Caches {
            inodes: self.inodes.clone(),
            dentries: self.dentries.clone(),
            grace: self.grace.clone(),
            metrics: self.metrics.clone(),
            max_branches: self.max_branches,
        }
    }
}

impl<N: HostEntity, B: Send + Sync + 'static> Caches<N, B> {
    /// Create empty pools configured by `o`.
    pub fn new(o: &Options) -> Self {
        let grace = GraceDomain::new();
        let metrics = Metrics::new(o.metrics);
        Caches {
            inodes: ObjectPool::new(grace.clone(), metrics.clone(), o.grow_batch, o.inode_limit),
            dentries: ObjectPool::new(
                grace.clone(),
                metrics.clone(),
                o.grow_batch,
                o.dentry_limit,
            ),
            grace,
            metrics,
            max_branches: o.max_branches,
        }
    }

    /// Allocate an inode container with a table of `branch_count` empty slots.
    ///
    /// On failure nothing stays allocated.
    pub fn alloc_inode(
        &self,
        branch_count: usize,
    ) -> Result<Pooled<InodeContainer<N, B>>, AllocError> {
        self.check_branch_count(ObjectKind::InodeContainer, branch_count)?;
        let mut inode = self.inodes.alloc()?;
        match inode.info_mut().init(branch_count) {
            Ok(()) => Ok(inode),
            Err(err) => {
                self.inodes.free_now(inode);
                Err(err)
            }
        }
    }

    /// Allocate a dentry info with a table of `branch_count` empty slots.
    ///
    /// On failure nothing stays allocated.
    pub fn alloc_dentry(&self, branch_count: usize) -> Result<Pooled<DentryInfo<B>>, AllocError> {
        self.check_branch_count(ObjectKind::DentryInfo, branch_count)?;
        let mut dentry = self.dentries.alloc()?;
        match dentry.info_mut().init(branch_count) {
            Ok(()) => Ok(dentry),
            Err(err) => {
                self.dentries.free_now(dentry);
                Err(err)
            }
        }
    }

    /// Free an inode container. Its branch references are released once the grace period ends.
    pub fn free_inode(&self, inode: Pooled<InodeContainer<N, B>>) {
        self.inodes.free(inode);
    }

    /// Free a dentry info. Whether this waits for a grace period depends on its size.
    pub fn free_dentry(&self, dentry: Pooled<DentryInfo<B>>) {
        self.dentries.free(dentry);
    }

    pub fn inodes(&self) -> &ObjectPool<InodeContainer<N, B>> {
        &self.inodes
    }

    pub fn dentries(&self) -> &ObjectPool<DentryInfo<B>> {
        &self.dentries
    }

    /// The grace domain shared by both pools.
    pub fn grace(&self) -> &GraceDomain {
        &self.grace
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Wait for every deferred free of both pools. The pools share a grace domain, so one barrier
    /// covers both.
    pub fn synchronize(&self) {
        self.inodes.synchronize();
    }

    fn check_branch_count(&self, kind: ObjectKind, requested: usize) -> Result<(), AllocError> {
        if requested > self.max_branches {
            log::debug!(
                "refusing {} with {} branches, maximum is {}",
                kind,
                requested,
                self.max_branches
            );
            return Err(AllocError::TooManyBranches {
                requested,
                max: self.max_branches,
            });
        }
        Ok(())
    }
}
