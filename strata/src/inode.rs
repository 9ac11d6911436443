//! Inode containers: entity info embedded next to the hosting filesystem's native inode.

use std::mem;

use strata_core::{size_class::RECLAIM_BOOKKEEPING, FreePolicy, LockClass, ObjectKind};

use crate::{
    entity::{Branches, EntityInfo},
    pool::Poolable,
};

/// The native inode state owned by the hosting filesystem.
///
/// `Default` gives the state a fresh pooled container starts with.
pub trait HostEntity: Default + Send + Sync + 'static {
    /// Whether the host has marked this inode bad on its own account.
    fn is_bad(&self) -> bool;
}

/// An inode's entity info together with the host inode it decorates.
///
/// Containers are pooled. Lock-free readers may reach the entity info through a published
/// container, so freed containers are always reclaimed after a grace period.
pub struct InodeContainer<N, B> {
    info: EntityInfo<B>,
    host: N,
}

impl<N: HostEntity, B> InodeContainer<N, B> {
    pub fn info(&self) -> &EntityInfo<B> {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut EntityInfo<B> {
        &mut self.info
    }

    pub fn host(&self) -> &N {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut N {
        &mut self.host
    }

    /// Whether the inode is unusable: either the host marked it bad or there is no branch at
    /// `top`.
    ///
    /// `view` must come from a guard on this container's own lock. Callers check this before
    /// relying on the range and refuse to proceed if it holds.
    pub fn is_bad(&self, view: &Branches<B>) -> bool {
        debug_assert!(self.info.owns(view), "view of a foreign inode");
        self.host.is_bad() || !view.has_valid_top()
    }
}

impl<N, B> Poolable for InodeContainer<N, B>
where
    N: HostEntity,
    B: Send + Sync + 'static,
{
    const KIND: ObjectKind = ObjectKind::InodeContainer;
    const POLICY: FreePolicy = {
        assert!(
            mem::size_of::<Self>() >= RECLAIM_BOOKKEEPING,
            "inode containers must be large enough for a deferred free"
        );
        FreePolicy::Deferred
    };

    fn construct() -> Self {
        InodeContainer {
            info: EntityInfo::new(LockClass::Inode),
            host: N::default(),
        }
    }

    fn recycle(&mut self) {
        self.info.fin();
        self.host = N::default();
    }
}
