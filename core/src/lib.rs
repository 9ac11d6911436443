//! Core value types of the strata union-mount entity model.
//!
//! This crate defines the identifiers and policies shared by every layer that touches a union
//! entity: branch indices, the lock subclass ordering, pooled object kinds and the allocator
//! size-class rules used to pick a reclamation policy.
//!
//! Nothing here requires the standard library.

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

pub mod branch;
pub mod kind;
pub mod lock_class;
pub mod size_class;

pub use branch::BranchIndex;
pub use kind::{FreePolicy, ObjectKind};
pub use lock_class::{LockClass, LockSubclass};
