//! Branch aggregation for union-mount entities.
//!
//! Every inode and directory entry of a union mount carries an [`EntityInfo`]: the inclusive
//! range `top..=bottom` of branches currently backing it and a table holding one reference per
//! branch. The table is guarded by an [`Rwsem`], which is always acquired under a
//! [`LockSubclass`] so that operations locking several entities do so in one global order.
//!
//! Entities live in pools ([`Caches`]). Objects that lock-free readers may reach are freed only
//! after a grace period of a [`GraceDomain`]; smaller ones go straight back to their free list.

pub use strata_core::{BranchIndex, FreePolicy, LockClass, LockSubclass, ObjectKind};

pub use cache::Caches;
pub use dentry::DentryInfo;
pub use entity::{Branches, EntityInfo, InfoReadGuard, InfoWriteGuard, ReplacePolicy};
pub use error::AllocError;
pub use grace::GraceDomain;
pub use inode::{HostEntity, InodeContainer};
pub use kbuf::KBuf;
pub use lock_order::held_mask;
pub use metrics::{Metric, Metrics};
pub use options::Options;
pub use pool::{ObjectPool, Poolable, Pooled};
pub use rwsem::{LockedState, Rwsem, RwsemReadGuard, RwsemWriteGuard};
pub use slot::SharedSlot;

mod cache;
mod dentry;
mod entity;
mod error;
mod grace;
mod inode;
mod kbuf;
mod lock_order;
mod metrics;
mod options;
mod pool;
mod rwsem;
mod slot;
