//! Pooled object kinds and the policies used to free them.

use crate::size_class::RECLAIM_BOOKKEEPING;
use core::fmt;

/// The two kinds of object kept in pools.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ObjectKind {
    /// Directory-entry info.
    DentryInfo,
    /// Inode entity info together with the hosting native inode.
    InodeContainer,
}

impl ObjectKind {
    pub const fn name(self) -> &'static str {
        match self {
            ObjectKind::DentryInfo => "dinfo",
            ObjectKind::InodeContainer => "icntnr",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a freed object goes back to its allocator.
///
/// The choice compares the object's size with [`RECLAIM_BOOKKEEPING`], the footprint a deferred
/// free needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreePolicy {
    /// Free after a grace period. Required for anything a lock-free reader may dereference.
    Deferred,
    /// Free synchronously. Only for objects too small to carry deferral bookkeeping, which must
    /// never be reached by lock-free readers.
    Immediate,
    /// Decide at free time from the actual allocation size.
    Conditional,
}

impl FreePolicy {
    /// The static policy for an object of `size` bytes.
    pub const fn for_size(size: usize) -> Self {
        if size >= RECLAIM_BOOKKEEPING {
            FreePolicy::Deferred
        } else {
            FreePolicy::Immediate
        }
    }

    /// Resolve [`FreePolicy::Conditional`] against an allocation size. The other policies are
    /// returned unchanged.
    pub const fn resolve(self, size: usize) -> Self {
        match self {
            FreePolicy::Conditional => Self::for_size(size),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_by_size() {
        assert_eq!(FreePolicy::for_size(RECLAIM_BOOKKEEPING), FreePolicy::Deferred);
        assert_eq!(FreePolicy::for_size(RECLAIM_BOOKKEEPING - 1), FreePolicy::Immediate);
        assert_eq!(FreePolicy::for_size(0), FreePolicy::Immediate);
    }

    #[test]
    fn only_conditional_resolves() {
        assert_eq!(FreePolicy::Conditional.resolve(4096), FreePolicy::Deferred);
        assert_eq!(FreePolicy::Conditional.resolve(1), FreePolicy::Immediate);
        assert_eq!(FreePolicy::Immediate.resolve(4096), FreePolicy::Immediate);
        assert_eq!(FreePolicy::Deferred.resolve(1), FreePolicy::Deferred);
    }
}
