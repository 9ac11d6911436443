//! Lock classes and subclasses.
//!
//! Operations frequently hold the locks of several distinct entities at once: rename holds both
//! parents and the moved child, copy-up holds an entity and the directories above it. Each lock is
//! taken under a [`LockSubclass`], and within one operation subclasses must be taken in strictly
//! increasing order. Two entities are never held under the same subclass at once.
//!
//! The ordering is per [`LockClass`]: inode info and dentry info locks are ordered independently.

use core::fmt;

/// The named positions of the global lock ordering, lowest first.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LockSubclass {
    /// The default single-entity lock. Children are locked first.
    Child = 0,
    /// The second child of an operation: rename and link targets, copy-up on notification.
    Child2 = 1,
    /// A child during directory copy-up.
    Child3 = 2,
    /// A parent entity, locked after its children.
    Parent = 3,
    /// The second parent of a multi-entity operation.
    Parent2 = 4,
    /// The third parent, used by directory copy-up.
    Parent3 = 5,
    /// A freshly created entity not yet visible to other threads.
    NewChild = 6,
}

impl LockSubclass {
    /// All subclasses in acquisition order.
    pub const ALL: [LockSubclass; 7] = [
        LockSubclass::Child,
        LockSubclass::Child2,
        LockSubclass::Child3,
        LockSubclass::Parent,
        LockSubclass::Parent2,
        LockSubclass::Parent3,
        LockSubclass::NewChild,
    ];

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// The bit this subclass occupies in a held-subclass mask.
    pub const fn bit(self) -> u8 {
        1 << self.index()
    }

    pub const fn name(self) -> &'static str {
        match self {
            LockSubclass::Child => "child",
            LockSubclass::Child2 => "child2",
            LockSubclass::Child3 => "child3",
            LockSubclass::Parent => "parent",
            LockSubclass::Parent2 => "parent2",
            LockSubclass::Parent3 => "parent3",
            LockSubclass::NewChild => "new_child",
        }
    }
}

impl fmt::Display for LockSubclass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which family of locks a subclass ordering applies to.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(u8)]
pub enum LockClass {
    /// Locks embedded in inode entity info.
    Inode = 0,
    /// Locks embedded in dentry info.
    Dentry = 1,
}

impl LockClass {
    pub const COUNT: usize = 2;

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LockClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockClass::Inode => f.write_str("iinfo"),
            LockClass::Dentry => f.write_str("dinfo"),
        }
    }
}
