//! Entity info: the record that aggregates the branch-local entities behind one union entity.
//!
//! An [`EntityInfo`] owns a [`Rwsem`] over [`Branches`]: the active range `top..=bottom` and a
//! table with one slot per configured branch. All accessors live on [`Branches`], which can only
//! be reached through a lock guard (or through `&mut EntityInfo`, which proves nobody else can
//! reach it). Reading needs a read guard; mutating needs a write guard.
//!
//! Each slot holds an owned, counted reference to a branch entity. Storing a reference takes
//! ownership of it; clearing or replacing a slot drops, and thereby releases, the previous one.
//!
//! The range is maintained by the callers: [`Branches::set_top`] and [`Branches::set_bottom`]
//! do not check it. Debug builds check it every time a write guard is released or downgraded,
//! which is the point where readers may observe it.

use std::mem;

use strata_core::{BranchIndex, LockClass, LockSubclass};

use crate::{
    error::AllocError,
    rwsem::{LockedState, Rwsem, RwsemReadGuard, RwsemWriteGuard},
};

/// Shared access to the branches of an entity.
pub type InfoReadGuard<'a, B> = RwsemReadGuard<'a, Branches<B>>;

/// Exclusive access to the branches of an entity.
pub type InfoWriteGuard<'a, B> = RwsemWriteGuard<'a, Branches<B>>;

/// What [`Branches::set_branch`] does with the reference it replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Drop the old reference, releasing it.
    Release,
    /// Hand the old reference back to the caller, who becomes responsible for it.
    Retain,
}

/// The active range and branch table of one entity.
pub struct Branches<B> {
    top: BranchIndex,
    bottom: BranchIndex,
    table: Box<[Option<B>]>,
}

impl<B> Branches<B> {
    fn empty() -> Self {
        Branches {
            top: BranchIndex::NONE,
            bottom: BranchIndex::NONE,
            table: Box::new([]),
        }
    }

    /// The highest-priority branch backing the entity.
    pub fn top(&self) -> BranchIndex {
        self.top
    }

    /// The lowest-priority branch backing the entity.
    pub fn bottom(&self) -> BranchIndex {
        self.bottom
    }

    /// The length of the table, fixed at initialization.
    pub fn branch_count(&self) -> usize {
        self.table.len()
    }

    /// The reference held for branch `index`, if any. The sentinel yields `None`.
    pub fn branch(&self, index: BranchIndex) -> Option<&B> {
        let i = index.as_usize()?;
        debug_assert!(
            i < self.table.len(),
            "branch {} out of range for {} branches",
            index,
            self.table.len()
        );
        self.table.get(i)?.as_ref()
    }

    /// Store `new` at `index`, taking ownership of it.
    ///
    /// The previous reference, if any, is released under [`ReplacePolicy::Release`] and returned
    /// under [`ReplacePolicy::Retain`].
    ///
    /// # Panics
    ///
    /// Panics if `index` is the sentinel or lies outside the table.
    pub fn set_branch(
        &mut self,
        index: BranchIndex,
        new: Option<B>,
        policy: ReplacePolicy,
    ) -> Option<B> {
        let len = self.table.len();
        let Some(slot) = index.as_usize().and_then(|i| self.table.get_mut(i)) else {
            panic!("branch {} out of range for {} branches", index, len);
        };
        let old = mem::replace(slot, new);
        match policy {
            ReplacePolicy::Release => {
                drop(old);
                None
            }
            ReplacePolicy::Retain => old,
        }
    }

    pub fn set_top(&mut self, index: BranchIndex) {
        debug_assert!(self.in_table_or_none(index));
        self.top = index;
    }

    pub fn set_bottom(&mut self, index: BranchIndex) {
        debug_assert!(self.in_table_or_none(index));
        self.bottom = index;
    }

    /// Whether a reference exists at `top`. An entity without one is bad and must not be used.
    pub fn has_valid_top(&self) -> bool {
        self.branch(self.top).is_some()
    }

    /// The populated slots within `top..=bottom`, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = (BranchIndex, &B)> + '_ {
        let start = (!self.top.is_none() && !self.bottom.is_none()).then_some(self.top);
        std::iter::successors(start, |index| Some(index.next()))
            .take_while(move |index| *index <= self.bottom)
            .filter_map(move |index| {
                let branch = self.table.get(index.as_usize()?)?.as_ref()?;
                Some((index, branch))
            })
    }

    fn in_table_or_none(&self, index: BranchIndex) -> bool {
        index.as_usize().map_or(true, |i| i < self.table.len())
    }
}

impl<B> LockedState for Branches<B> {
    fn assert_consistent(&self) {
        if self.has_valid_top() {
            assert!(
                self.top <= self.bottom,
                "branch range inverted: top {} below bottom {}",
                self.top,
                self.bottom
            );
        }
    }
}

/// The per-entity record: a lock over the active range and the branch table.
pub struct EntityInfo<B> {
    rwsem: Rwsem<Branches<B>>,
}

macro_rules! subclass_lock_fns {
    ($($read:ident, $write:ident => $subclass:ident;)*) => {
        $(
            #[doc = concat!("[`Self::read`] under [`LockSubclass::", stringify!($subclass), "`].")]
            pub fn $read(&self) -> InfoReadGuard<'_, B> {
                self.read(LockSubclass::$subclass)
            }

            #[doc = concat!("[`Self::write`] under [`LockSubclass::", stringify!($subclass), "`].")]
            pub fn $write(&self) -> InfoWriteGuard<'_, B> {
                self.write(LockSubclass::$subclass)
            }
        )*
    };
}

impl<B> EntityInfo<B> {
    /// Construct an entity info with its lock ready and no table. This is the state pooled
    /// objects are kept in; [`EntityInfo::init`] sizes the table.
    pub fn new(class: LockClass) -> Self {
        EntityInfo {
            rwsem: Rwsem::new(class, Branches::empty()),
        }
    }

    /// Construct and initialize in one step.
    pub fn with_branches(class: LockClass, branch_count: usize) -> Result<Self, AllocError> {
        let mut info = Self::new(class);
        info.init(branch_count)?;
        Ok(info)
    }

    /// Allocate a table of `branch_count` empty slots and reset the range to the sentinel.
    ///
    /// On failure nothing changes.
    pub fn init(&mut self, branch_count: usize) -> Result<(), AllocError> {
        let state = self.rwsem.get_mut();
        debug_assert!(state.table.is_empty(), "entity info initialized twice");

        // every slot must be addressable by a `BranchIndex`.
        if branch_count > 0 && BranchIndex::from_usize(branch_count - 1).is_none() {
            return Err(AllocError::TooManyBranches {
                requested: branch_count,
                max: BranchIndex::MAX.get() as usize + 1,
            });
        }

        let mut table = Vec::new();
        table.try_reserve_exact(branch_count).map_err(|_| {
            log::debug!("failed to allocate a table of {} branches", branch_count);
            AllocError::OutOfMemory {
                size: branch_count.saturating_mul(mem::size_of::<Option<B>>()),
            }
        })?;
        table.resize_with(branch_count, || None);

        state.table = table.into_boxed_slice();
        state.top = BranchIndex::NONE;
        state.bottom = BranchIndex::NONE;
        Ok(())
    }

    /// Release every held reference and free the table, returning to the constructed state.
    ///
    /// A second call finds nothing to release.
    pub fn fin(&mut self) {
        self.rwsem.must_no_waiters();
        let state = self.rwsem.get_mut();
        state.top = BranchIndex::NONE;
        state.bottom = BranchIndex::NONE;
        // dropping the table releases every reference in it.
        state.table = Box::new([]);
    }

    /// Acquire the lock for reading under `subclass`.
    pub fn read(&self, subclass: LockSubclass) -> InfoReadGuard<'_, B> {
        self.rwsem.read_nested(subclass)
    }

    /// Acquire the lock for writing under `subclass`.
    pub fn write(&self, subclass: LockSubclass) -> InfoWriteGuard<'_, B> {
        self.rwsem.write_nested(subclass)
    }

    subclass_lock_fns! {
        read_child, write_child => Child;
        read_child2, write_child2 => Child2;
        read_child3, write_child3 => Child3;
        read_parent, write_parent => Parent;
        read_parent2, write_parent2 => Parent2;
        read_parent3, write_parent3 => Parent3;
        read_new_child, write_new_child => NewChild;
    }

    /// The lock itself, for its debug assertions.
    pub fn rwsem(&self) -> &Rwsem<Branches<B>> {
        &self.rwsem
    }

    /// Unlocked access for a holder of the only reference, e.g. while the entity is being set up.
    pub fn branches_mut(&mut self) -> &mut Branches<B> {
        self.rwsem.get_mut()
    }

    /// Whether `view` is the state protected by this info's lock.
    pub fn owns(&self, view: &Branches<B>) -> bool {
        std::ptr::eq(view, self.rwsem.data_ptr())
    }
}
