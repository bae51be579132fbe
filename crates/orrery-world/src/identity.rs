//! Entity identity and allocation.
//!
//! An [`EntityId`] is a process-unique, monotonically increasing integer
//! assigned once at entity construction. Identities are never reused: even
//! after an entity is destroyed, its number stays retired for the lifetime of
//! the process. Allocation goes through an explicit [`IdAllocator`] owned by
//! the registry rather than a hidden global counter, which keeps identity
//! assignment deterministic and testable in isolation.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// The unique, immutable integer naming one entity for the lifetime of the
/// process.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    ///
    /// Only meaningful for values previously produced by an [`IdAllocator`]
    /// in this process; mainly useful in tests and diagnostics.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

/// Hands out [`EntityId`]s in strictly increasing order, never reusing one.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create an allocator starting at id 0.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate the next identity.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Total number of identities handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_strictly_increasing() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert!(a < b && b < c);
    }

    #[test]
    fn ids_are_pairwise_distinct() {
        let mut alloc = IdAllocator::new();
        let ids: HashSet<EntityId> = (0..1000).map(|_| alloc.allocate()).collect();
        assert_eq!(ids.len(), 1000);
        assert_eq!(alloc.allocated(), 1000);
    }

    #[test]
    fn raw_roundtrip() {
        let mut alloc = IdAllocator::new();
        let id = alloc.allocate();
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
    }
}
