use std::fmt;

use strata_core::ObjectKind;

/// Failure to obtain memory for an entity, a pooled object or a buffer.
///
/// Returned explicitly by every allocating entry point. Nothing half-initialized is left reachable
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The backing allocator refused a request of `size` bytes.
    OutOfMemory { size: usize },
    /// The pool for `kind` already has `limit` live objects.
    PoolExhausted { kind: ObjectKind, limit: usize },
    /// A branch table of `requested` slots exceeds the configured maximum.
    TooManyBranches { requested: usize, max: usize },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory { size } => {
                write!(f, "out of memory allocating {} bytes", size)
            }
            AllocError::PoolExhausted { kind, limit } => {
                write!(f, "{} pool exhausted ({} live objects)", kind, limit)
            }
            AllocError::TooManyBranches { requested, max } => {
                write!(f, "branch table of {} slots exceeds maximum of {}", requested, max)
            }
        }
    }
}

impl std::error::Error for AllocError {}
