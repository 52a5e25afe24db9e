//! Pool geometry and slot addressing
//!
//! Every address handed out by the pool maps to exactly one `(slab, slot)`
//! pair. All range and alignment checks happen on that pair rather than on
//! raw pointer comparisons.

use crate::error::ReleaseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of slabs in a pool
pub const SLAB_COUNT: usize = 16;
/// Size of one slab in bytes
pub const SLAB_SIZE: usize = 4096;
/// Size of one object slot in bytes
pub const SLOT_SIZE: usize = 256;
/// Slots per slab, including the metadata slot
pub const SLOTS_PER_SLAB: usize = SLAB_SIZE / SLOT_SIZE;
/// Slot index reserved for the slab's own metadata
pub const METADATA_SLOT: u8 = 0;
/// Allocatable objects per slab
pub const OBJECTS_PER_SLAB: usize = SLOTS_PER_SLAB - 1;
/// Total pool size in bytes
pub const POOL_SIZE: usize = SLAB_COUNT * SLAB_SIZE;
/// Total allocatable objects in a pool
pub const POOL_CAPACITY: usize = SLAB_COUNT * OBJECTS_PER_SLAB;

/// Absolute address of an object slot
///
/// Addresses are plain integers; the pool never dereferences them. Object
/// memory is reached through [`SlabPool::object`](super::SlabPool::object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    /// Raw address value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Position of a slot inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId {
    /// Slab index (0-15)
    pub slab: u8,
    /// Slot index within the slab (0-15, 0 is metadata)
    pub slot: u8,
}

impl SlotId {
    /// Create a slot id. Returns `None` if either index is outside the pool.
    pub fn new(slab: u8, slot: u8) -> Option<Self> {
        if usize::from(slab) < SLAB_COUNT && usize::from(slot) < SLOTS_PER_SLAB {
            Some(Self { slab, slot })
        } else {
            None
        }
    }

    /// Whether this is the reserved metadata slot of its slab
    pub fn is_metadata(&self) -> bool {
        self.slot == METADATA_SLOT
    }

    /// Byte offset of this slot from the pool base
    pub fn offset(&self) -> usize {
        usize::from(self.slab) * SLAB_SIZE + usize::from(self.slot) * SLOT_SIZE
    }

    /// Absolute address of this slot for a pool starting at `base`
    pub fn address(&self, base: Address) -> Address {
        Address(base.0 + self.offset() as u64)
    }

    /// Decode an absolute address into an allocatable slot.
    ///
    /// Rejects addresses outside `[base, base + POOL_SIZE)`, addresses that
    /// are not on a slot boundary, and metadata slots.
    pub fn from_address(base: Address, address: Address) -> Result<Self, ReleaseError> {
        let out_of_range = || ReleaseError::OutOfRange { address };

        let offset = address.0.checked_sub(base.0).ok_or_else(out_of_range)?;
        if offset >= POOL_SIZE as u64 || offset % SLOT_SIZE as u64 != 0 {
            return Err(out_of_range());
        }

        let offset = offset as usize;
        let slab = (offset / SLAB_SIZE) as u8;
        let slot = ((offset % SLAB_SIZE) / SLOT_SIZE) as u8;
        let id = Self { slab, slot };
        if id.is_metadata() {
            return Err(out_of_range());
        }

        Ok(id)
    }

    /// Slab index as `usize`
    pub fn slab_index(&self) -> usize {
        usize::from(self.slab)
    }

    /// Slot index as `usize`
    pub fn slot_index(&self) -> usize {
        usize::from(self.slot)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot(slab={}, slot={})", self.slab, self.slot)
    }
}
