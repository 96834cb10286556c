//! Specialized collection types
//!
//! Arena keys for per-frame objects and lazily created batching resources,
//! plus a monotonic id source for interned values.

use std::sync::atomic::{AtomicU64, Ordering};

pub use slotmap::{SlotMap, SecondaryMap};

slotmap::new_key_type! {
    /// Key of a cullable object inside a bin's object arena
    pub struct ObjectKey;

    /// Key of a dynamic mesh inside a dynamic batch registry
    pub struct MeshId;
}

/// Monotonic id source
///
/// Ids are never reused for the lifetime of the allocator, so two live
/// values with the same id are the same value.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator whose first id is 1 (0 is reserved for "none")
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Hand out the next id
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_allocator_is_monotonic() {
        let ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(ids.allocated(), 2);
    }
}
