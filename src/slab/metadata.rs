//! Per-slab metadata record and its on-slot encoding
//!
//! Slot 0 of every slab is self-describing: its first eight bytes hold a
//! big-endian `u64` packed as
//!
//! ```text
//!  63    60 59            44 43                    12 11      0
//! +--------+----------------+------------------------+---------+
//! | count  |   free_mask    |       signature        |  zero   |
//! +--------+----------------+------------------------+---------+
//! ```
//!
//! The rest of the metadata slot stays zeroed.

use super::slot::{OBJECTS_PER_SLAB, SLOTS_PER_SLAB};
use serde::{Deserialize, Serialize};

/// Integrity marker written into every metadata slot
pub const SIGNATURE: u32 = 0x51AB_51AB;

/// Bytes of the metadata slot that carry the encoded record
pub const ENCODED_LEN: usize = 8;

/// `free_mask` with every usable slot free (slot 0 is bit 15)
pub const USABLE_MASK: u16 = 0x7FFF;

const COUNT_SHIFT: u32 = 60;
const MASK_SHIFT: u32 = 44;
const SIGNATURE_SHIFT: u32 = 12;

/// `free_mask` bit for a slot; slot 0 is the most significant bit
pub fn slot_bit(slot: usize) -> u16 {
    debug_assert!(slot < SLOTS_PER_SLAB);
    1 << (SLOTS_PER_SLAB - 1 - slot)
}

/// Decoded slab metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlabMeta {
    /// Number of free usable slots (0-15)
    pub free_count: u8,
    /// Free bit per slot, MSB first
    pub free_mask: u16,
    /// Integrity marker, [`SIGNATURE`] when intact
    pub signature: u32,
}

impl SlabMeta {
    /// Metadata of a slab with every usable slot free
    pub fn fresh() -> Self {
        Self {
            free_count: OBJECTS_PER_SLAB as u8,
            free_mask: USABLE_MASK,
            signature: SIGNATURE,
        }
    }

    /// Pack into the 64-bit on-slot representation
    pub fn encode(&self) -> u64 {
        (u64::from(self.free_count & 0x0F) << COUNT_SHIFT)
            | (u64::from(self.free_mask) << MASK_SHIFT)
            | (u64::from(self.signature) << SIGNATURE_SHIFT)
    }

    /// Unpack from the 64-bit on-slot representation
    pub fn decode(raw: u64) -> Self {
        Self {
            free_count: (raw >> COUNT_SHIFT) as u8 & 0x0F,
            free_mask: (raw >> MASK_SHIFT) as u16,
            signature: (raw >> SIGNATURE_SHIFT) as u32,
        }
    }

    /// Write the encoded record into the head of a metadata slot
    pub fn write_to(&self, slot: &mut [u8]) {
        slot[..ENCODED_LEN].copy_from_slice(&self.encode().to_be_bytes());
    }

    /// Read the encoded record from the head of a metadata slot
    pub fn read_from(slot: &[u8]) -> Self {
        let mut raw = [0u8; ENCODED_LEN];
        raw.copy_from_slice(&slot[..ENCODED_LEN]);
        Self::decode(u64::from_be_bytes(raw))
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == SIGNATURE
    }

    /// Whether `slot` is marked free
    pub fn is_free(&self, slot: usize) -> bool {
        self.free_mask & slot_bit(slot) != 0
    }

    /// Number of free bits among usable slots
    pub fn usable_popcount(&self) -> u8 {
        (self.free_mask & USABLE_MASK).count_ones() as u8
    }

    /// `free_count` agrees with the mask and the metadata slot is not marked free
    pub fn is_consistent(&self) -> bool {
        self.free_mask & !USABLE_MASK == 0 && self.free_count == self.usable_popcount()
    }

    /// Lowest-indexed free usable slot
    pub fn first_free_slot(&self) -> Option<usize> {
        let usable = self.free_mask & USABLE_MASK;
        if usable == 0 {
            None
        } else {
            Some(usable.leading_zeros() as usize)
        }
    }

    /// Mark `slot` allocated
    pub fn take(&mut self, slot: usize) {
        self.free_mask &= !slot_bit(slot);
        self.free_count -= 1;
    }

    /// Mark `slot` free
    pub fn give_back(&mut self, slot: usize) {
        self.free_mask |= slot_bit(slot);
        self.free_count += 1;
    }
}

impl Default for SlabMeta {
    fn default() -> Self {
        Self::fresh()
    }
}
