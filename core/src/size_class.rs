//! Allocator size classes.
//!
//! Small allocations are rounded up to a fixed set of capacities: powers of two from 8 bytes,
//! plus the two odd classes 96 and 192. Resizing between two sizes of the same class never needs
//! a new allocation.

/// Bytes of bookkeeping a deferred free embeds in the object: a callback and a queue link.
pub const RECLAIM_BOOKKEEPING: usize = 2 * core::mem::size_of::<usize>();

/// The smallest non-empty class.
pub const MIN_CLASS: usize = 8;

/// The capacity of the size class serving a request of `size` bytes.
///
/// Zero-sized requests map to the empty class. Returns `None` when the rounded capacity would
/// overflow `usize`.
pub fn size_class(size: usize) -> Option<usize> {
    match size {
        0 => Some(0),
        1..=MIN_CLASS => Some(MIN_CLASS),
        65..=96 => Some(96),
        129..=192 => Some(192),
        _ => size.checked_next_power_of_two(),
    }
}

/// Whether two sizes are served by the same class.
pub fn same_class(a: usize, b: usize) -> bool {
    match (size_class(a), size_class(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
