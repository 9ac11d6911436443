//! Raw byte buffers allocated by size class.
//!
//! A [`KBuf`] owns an allocation whose capacity is always a whole size class (see
//! [`strata_core::size_class`]) and tracks how many leading bytes are in use. Resizing within
//! the current class touches no allocator at all.

use strata_core::{
    size_class::{same_class, size_class, RECLAIM_BOOKKEEPING},
    FreePolicy,
};

use crate::{error::AllocError, grace::GraceDomain};

/// A growable byte buffer with explicit, fallible resizing.
#[derive(Default)]
pub struct KBuf {
    bytes: Box<[u8]>,
    len: usize,
}

impl KBuf {
    /// An empty buffer without an allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Result<Self, AllocError> {
        Ok(KBuf {
            bytes: alloc_class(len)?,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The size of the underlying allocation.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    /// Change the used length to `new_len`.
    ///
    /// When `new_len` falls in the size class of the current allocation, the allocation is kept.
    /// Growing in place exposes whatever the newly used bytes held before unless
    /// `zero_new_bytes` is set; growing into a new allocation always yields zeroes.
    ///
    /// Shrinking only happens with `allow_shrink`. Without it, a smaller `new_len` leaves the
    /// buffer exactly as it was and succeeds.
    ///
    /// On failure the buffer is unchanged.
    pub fn resize(
        &mut self,
        new_len: usize,
        zero_new_bytes: bool,
        allow_shrink: bool,
    ) -> Result<(), AllocError> {
        if new_len < self.len && !allow_shrink {
            return Ok(());
        }

        if same_class(self.capacity(), new_len) {
            if zero_new_bytes && new_len > self.len {
                self.bytes[self.len..new_len].fill(0);
            }
            self.len = new_len;
            return Ok(());
        }

        let mut bytes = alloc_class(new_len)?;
        let kept = self.len.min(new_len);
        bytes[..kept].copy_from_slice(&self.bytes[..kept]);
        self.bytes = bytes;
        self.len = new_len;
        Ok(())
    }

    /// Give the buffer back to the allocator under `policy`.
    ///
    /// [`FreePolicy::Conditional`] defers the free if the allocation can carry the deferral
    /// bookkeeping. An explicit policy that does not fit the allocation size is a caller bug.
    pub fn free(self, grace: &GraceDomain, policy: FreePolicy) {
        let capacity = self.capacity();
        match policy.resolve(capacity) {
            FreePolicy::Immediate => {
                debug_assert!(
                    policy == FreePolicy::Conditional || capacity < RECLAIM_BOOKKEEPING,
                    "buffer of {} bytes freed immediately",
                    capacity
                );
                drop(self);
            }
            _ => {
                debug_assert!(
                    capacity >= RECLAIM_BOOKKEEPING,
                    "buffer of {} bytes is too small for a deferred free",
                    capacity
                );
                grace.defer_drop(self);
            }
        }
    }
}

fn alloc_class(len: usize) -> Result<Box<[u8]>, AllocError> {
    let capacity = size_class(len).ok_or(AllocError::OutOfMemory { size: len })?;
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(capacity)
        .map_err(|_| AllocError::OutOfMemory { size: capacity })?;
    bytes.resize(capacity, 0);
    Ok(bytes.into_boxed_slice())
}
