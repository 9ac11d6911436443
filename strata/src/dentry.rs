//! Directory-entry info, pooled on its own.

use strata_core::{FreePolicy, LockClass, ObjectKind};

use crate::{
    entity::{Branches, EntityInfo},
    pool::Poolable,
};

/// The entity info of a directory entry.
///
/// Same layout as an inode's, tracked under [`LockClass::Dentry`] so its subclass order is
/// independent of inode locks. Whether a freed one waits for a grace period depends on its size.
pub struct DentryInfo<B> {
    info: EntityInfo<B>,
}

impl<B> DentryInfo<B> {
    pub fn info(&self) -> &EntityInfo<B> {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut EntityInfo<B> {
        &mut self.info
    }

    /// Whether there is no branch at `top`. `view` must be guarded by this entry's lock.
    pub fn is_bad(&self, view: &Branches<B>) -> bool {
        debug_assert!(self.info.owns(view), "view of a foreign dentry");
        !view.has_valid_top()
    }
}

impl<B: Send + Sync + 'static> Poolable for DentryInfo<B> {
    const KIND: ObjectKind = ObjectKind::DentryInfo;
    const POLICY: FreePolicy = FreePolicy::Conditional;

    fn construct() -> Self {
        DentryInfo {
            info: EntityInfo::new(LockClass::Dentry),
        }
    }

    fn recycle(&mut self) {
        self.info.fin();
    }
}
