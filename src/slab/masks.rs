//! Pool-level occupancy masks
//!
//! Each slab sits in exactly one of three categories. The masks mirror
//! `free_count` of every slab so slab selection never has to decode
//! metadata.

use super::slot::{OBJECTS_PER_SLAB, SLAB_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Occupancy category of a slab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlabState {
    /// No free objects
    Full,
    /// Some objects free
    Partial,
    /// Every object free
    Empty,
}

impl SlabState {
    /// Category implied by a slab's free object count
    pub fn from_free_count(free_count: u8) -> Self {
        match usize::from(free_count) {
            0 => SlabState::Full,
            OBJECTS_PER_SLAB => SlabState::Empty,
            _ => SlabState::Partial,
        }
    }
}

impl fmt::Display for SlabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlabState::Full => "full",
            SlabState::Partial => "partial",
            SlabState::Empty => "empty",
        };
        f.pad(name)
    }
}

/// Mask bit for a slab; slab 0 is the most significant bit
pub fn slab_bit(slab: usize) -> u16 {
    debug_assert!(slab < SLAB_COUNT);
    1 << (SLAB_COUNT - 1 - slab)
}

/// Full/partial/empty bitmasks over all slabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMasks {
    pub full: u16,
    pub partial: u16,
    pub empty: u16,
}

impl PoolMasks {
    /// Masks of a pool whose slabs are all empty
    pub fn all_empty() -> Self {
        Self {
            full: 0,
            partial: 0,
            empty: u16::MAX,
        }
    }

    /// No masks set at all, used while rebuilding from metadata
    pub(crate) fn cleared() -> Self {
        Self {
            full: 0,
            partial: 0,
            empty: 0,
        }
    }

    /// Move `slab` into `state`, clearing it from the other two masks
    pub fn set(&mut self, slab: usize, state: SlabState) {
        let bit = slab_bit(slab);
        self.full &= !bit;
        self.partial &= !bit;
        self.empty &= !bit;
        match state {
            SlabState::Full => self.full |= bit,
            SlabState::Partial => self.partial |= bit,
            SlabState::Empty => self.empty |= bit,
        }
    }

    /// Category of `slab`, or `None` unless exactly one mask claims it
    pub fn state_of(&self, slab: usize) -> Option<SlabState> {
        let bit = slab_bit(slab);
        match (self.full & bit != 0, self.partial & bit != 0, self.empty & bit != 0) {
            (true, false, false) => Some(SlabState::Full),
            (false, true, false) => Some(SlabState::Partial),
            (false, false, true) => Some(SlabState::Empty),
            _ => None,
        }
    }

    /// Every slab is full
    pub fn is_exhausted(&self) -> bool {
        self.partial == 0 && self.empty == 0
    }

    /// Slab to allocate from: lowest partial slab, else lowest empty slab
    pub fn select_slab(&self) -> Option<usize> {
        if self.partial != 0 {
            Some(self.partial.leading_zeros() as usize)
        } else if self.empty != 0 {
            Some(self.empty.leading_zeros() as usize)
        } else {
            None
        }
    }

    /// Every slab is claimed by exactly one mask
    pub fn is_exclusive(&self) -> bool {
        self.full & self.partial == 0
            && self.full & self.empty == 0
            && self.partial & self.empty == 0
            && self.full | self.partial | self.empty == u16::MAX
    }
}

impl Default for PoolMasks {
    fn default() -> Self {
        Self::all_empty()
    }
}
