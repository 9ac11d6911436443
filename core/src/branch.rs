//! Branch indices.
//!
//! A union stacks its branches in priority order. Index 0 is the highest-priority branch, the one
//! searched first; larger indices are searched later. Indices are signed so that "no branch" has a
//! representation that sorts before every real branch.

use core::fmt;

/// The position of one configured branch in the union stack.
///
/// Lower values have higher priority.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BranchIndex(i16);

impl BranchIndex {
    /// The sentinel meaning "no branch backs this entity".
    pub const NONE: BranchIndex = BranchIndex(-1);

    /// The highest-priority branch.
    pub const TOP: BranchIndex = BranchIndex(0);

    /// The largest index a union may configure.
    pub const MAX: BranchIndex = BranchIndex(i16::MAX - 1);

    pub const fn new(index: i16) -> Self {
        BranchIndex(index)
    }

    /// Create an index from a table position. Returns `None` if it does not fit.
    pub fn from_usize(index: usize) -> Option<Self> {
        if index > Self::MAX.0 as usize {
            return None;
        }
        Some(BranchIndex(index as i16))
    }

    pub const fn get(self) -> i16 {
        self.0
    }

    /// Whether this is the [`BranchIndex::NONE`] sentinel, or any other negative value.
    pub const fn is_none(self) -> bool {
        self.0 < 0
    }

    /// The table position of this index, or `None` for the sentinel.
    pub fn as_usize(self) -> Option<usize> {
        if self.is_none() {
            None
        } else {
            Some(self.0 as usize)
        }
    }

    /// The next lower-priority branch.
    pub const fn next(self) -> Self {
        BranchIndex(self.0 + 1)
    }
}

impl Default for BranchIndex {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for BranchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "BranchIndex(none)")
        } else {
            write!(f, "BranchIndex({})", self.0)
        }
    }
}

impl fmt::Display for BranchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("-")
        } else {
            write!(f, "b{}", self.0)
        }
    }
}
