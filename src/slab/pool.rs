//! Slab pool implementation

use super::masks::{PoolMasks, SlabState};
use super::metadata::{SlabMeta, USABLE_MASK};
use super::slot::{
    Address, SlotId, METADATA_SLOT, OBJECTS_PER_SLAB, POOL_CAPACITY, POOL_SIZE, SLAB_COUNT,
    SLAB_SIZE, SLOT_SIZE,
};
use crate::config::PoolConfig;
use crate::error::{AccessError, AllocError, ConfigError, IntegrityError, ReleaseError, Result};
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use tracing::{debug, error, info, warn};

/// Fixed-topology slab pool
///
/// Owns the 64 KiB backing image. Slot 0 of every slab stores that slab's
/// encoded [`SlabMeta`]; the three pool masks are a cache of each slab's
/// category and can always be rebuilt from the image with
/// [`SlabPool::from_memory`].
pub struct SlabPool {
    /// Address of the first byte of slab 0
    base: Address,
    /// Occupancy category of every slab
    masks: PoolMasks,
    /// Backing image, `POOL_SIZE` bytes
    memory: Vec<u8>,
}

impl SlabPool {
    /// Create a pool with every slab empty
    pub fn new(config: &PoolConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let mut pool = Self {
            base: config.base(),
            masks: PoolMasks::all_empty(),
            memory: vec![0u8; POOL_SIZE],
        };
        for slab in 0..SLAB_COUNT {
            pool.store_meta(slab, &SlabMeta::fresh());
        }

        info!(
            "Initialized slab pool at {} ({} slabs x {} objects of {} bytes)",
            pool.base, SLAB_COUNT, OBJECTS_PER_SLAB, SLOT_SIZE
        );
        Ok(pool)
    }

    /// Rebuild a pool from a raw image produced by [`SlabPool::into_memory`]
    ///
    /// Every slab's metadata must be intact; the pool masks are derived
    /// from the decoded free counts.
    pub fn from_memory(config: &PoolConfig, memory: Vec<u8>) -> Result<Self> {
        config.validate()?;
        if memory.len() != POOL_SIZE {
            return Err(IntegrityError::WrongImageSize {
                expected: POOL_SIZE,
                actual: memory.len(),
            }
            .into());
        }

        let mut pool = Self {
            base: config.base(),
            masks: PoolMasks::cleared(),
            memory,
        };
        for slab in 0..SLAB_COUNT {
            let meta = pool.load_meta(slab);
            check_meta(slab, &meta)?;
            pool.masks.set(slab, SlabState::from_free_count(meta.free_count));
        }

        info!(
            "Recovered slab pool at {}: full={:#06x} partial={:#06x} empty={:#06x}",
            pool.base, pool.masks.full, pool.masks.partial, pool.masks.empty
        );
        Ok(pool)
    }

    /// Allocate one object, or `None` if the pool cannot provide one
    ///
    /// Use [`SlabPool::try_allocate`] to find out why.
    pub fn allocate(&mut self) -> Option<Address> {
        self.try_allocate().ok()
    }

    /// Allocate one object from the lowest partial slab, falling back to
    /// the lowest empty slab. The object's bytes are zeroed.
    pub fn try_allocate(&mut self) -> std::result::Result<Address, AllocError> {
        if self.masks.is_exhausted() {
            debug!("Allocation failed: pool exhausted");
            return Err(AllocError::Exhausted);
        }
        let slab = self.masks.select_slab().ok_or(AllocError::Exhausted)?;

        let mut meta = self.load_meta(slab);
        if !meta.has_valid_signature() || !meta.is_consistent() {
            warn!(
                "Refusing to allocate from slab {}: metadata {:#018x} is corrupted",
                slab,
                meta.encode()
            );
            return Err(AllocError::Corrupted { slab });
        }

        let Some(slot) = meta.first_free_slot() else {
            error!(
                "Slab {} is {:?} in pool masks but has no free slot",
                slab,
                self.masks.state_of(slab)
            );
            return Err(AllocError::Inconsistent { slab });
        };

        meta.take(slot);
        self.store_meta(slab, &meta);
        self.masks.set(slab, SlabState::from_free_count(meta.free_count));

        let id = SlotId {
            slab: slab as u8,
            slot: slot as u8,
        };
        let range = self.slot_range(id);
        self.memory[range].fill(0);

        let address = id.address(self.base);
        debug!("Allocated {} at {} ({} free in slab)", id, address, meta.free_count);
        Ok(address)
    }

    /// Return an object to the pool
    pub fn release(&mut self, address: Address) -> std::result::Result<(), ReleaseError> {
        let id = SlotId::from_address(self.base, address).map_err(|e| {
            warn!("Rejected release of {}: not an object slot", address);
            e
        })?;
        let slab = id.slab_index();

        let mut meta = self.load_meta(slab);
        if !meta.has_valid_signature() || !meta.is_consistent() {
            warn!(
                "Rejected release of {}: slab {} metadata {:#018x} is corrupted",
                address,
                slab,
                meta.encode()
            );
            return Err(ReleaseError::Corrupted { slab });
        }
        if meta.is_free(id.slot_index()) {
            warn!("Rejected release of {}: already free", address);
            return Err(ReleaseError::DoubleFree { address });
        }

        meta.give_back(id.slot_index());
        self.store_meta(slab, &meta);
        self.masks.set(slab, SlabState::from_free_count(meta.free_count));

        debug!("Released {} at {} ({} free in slab)", id, address, meta.free_count);
        Ok(())
    }

    /// Bytes of an allocated object
    pub fn object(&self, address: Address) -> std::result::Result<&[u8], AccessError> {
        let id = self.resolve_allocated(address)?;
        Ok(&self.memory[self.slot_range(id)])
    }

    /// Mutable bytes of an allocated object
    pub fn object_mut(&mut self, address: Address) -> std::result::Result<&mut [u8], AccessError> {
        let id = self.resolve_allocated(address)?;
        let range = self.slot_range(id);
        Ok(&mut self.memory[range])
    }

    /// Check every slab's metadata and its agreement with the pool masks
    pub fn verify(&self) -> std::result::Result<(), IntegrityError> {
        for slab in 0..SLAB_COUNT {
            let meta = self.load_meta(slab);
            check_meta(slab, &meta)?;

            let expected = SlabState::from_free_count(meta.free_count);
            let found = self.masks.state_of(slab);
            if found != Some(expected) {
                return Err(IntegrityError::CategoryMismatch {
                    slab,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Snapshot of pool occupancy
    pub fn stats(&self) -> PoolStats {
        let slabs: Vec<SlabStats> = (0..SLAB_COUNT)
            .map(|index| {
                let meta = self.load_meta(index);
                SlabStats {
                    index,
                    state: SlabState::from_free_count(meta.free_count),
                    free_count: meta.free_count,
                    free_mask: meta.free_mask,
                    intact: meta.has_valid_signature() && meta.is_consistent(),
                }
            })
            .collect();

        let available: usize = slabs.iter().map(|s| usize::from(s.free_count)).sum();
        PoolStats {
            base: self.base,
            masks: self.masks,
            allocated: POOL_CAPACITY.saturating_sub(available),
            available,
            slabs,
        }
    }

    /// Decoded metadata of a slab
    pub fn slab_meta(&self, slab: usize) -> Option<SlabMeta> {
        (slab < SLAB_COUNT).then(|| self.load_meta(slab))
    }

    /// Category of a slab according to the pool masks
    pub fn slab_state(&self, slab: usize) -> Option<SlabState> {
        (slab < SLAB_COUNT)
            .then(|| self.masks.state_of(slab))
            .flatten()
    }

    /// Address of the first byte of slab 0
    pub fn base(&self) -> Address {
        self.base
    }

    pub fn masks(&self) -> PoolMasks {
        self.masks
    }

    /// Number of free objects across all slabs
    pub fn available(&self) -> usize {
        (0..SLAB_COUNT)
            .map(|slab| usize::from(self.load_meta(slab).free_count))
            .sum()
    }

    /// Number of allocated objects across all slabs
    pub fn allocated(&self) -> usize {
        POOL_CAPACITY.saturating_sub(self.available())
    }

    /// Raw pool image, metadata slots included
    pub fn as_bytes(&self) -> &[u8] {
        &self.memory
    }

    /// Tear the pool down, keeping its image
    pub fn into_memory(self) -> Vec<u8> {
        self.memory
    }

    fn resolve_allocated(&self, address: Address) -> std::result::Result<SlotId, AccessError> {
        let id = SlotId::from_address(self.base, address)?;
        let meta = self.load_meta(id.slab_index());
        if !meta.has_valid_signature() {
            return Err(AccessError::Corrupted {
                slab: id.slab_index(),
            });
        }
        if meta.is_free(id.slot_index()) {
            return Err(AccessError::NotAllocated { address });
        }
        Ok(id)
    }

    fn slot_range(&self, id: SlotId) -> Range<usize> {
        let start = id.offset();
        start..start + SLOT_SIZE
    }

    fn metadata_range(slab: usize) -> Range<usize> {
        let start = slab * SLAB_SIZE + usize::from(METADATA_SLOT) * SLOT_SIZE;
        start..start + SLOT_SIZE
    }

    fn load_meta(&self, slab: usize) -> SlabMeta {
        SlabMeta::read_from(&self.memory[Self::metadata_range(slab)])
    }

    fn store_meta(&mut self, slab: usize, meta: &SlabMeta) {
        meta.write_to(&mut self.memory[Self::metadata_range(slab)]);
    }
}

impl Default for SlabPool {
    fn default() -> Self {
        let mut pool = Self {
            base: PoolConfig::default().base(),
            masks: PoolMasks::all_empty(),
            memory: vec![0u8; POOL_SIZE],
        };
        for slab in 0..SLAB_COUNT {
            pool.store_meta(slab, &SlabMeta::fresh());
        }
        pool
    }
}

impl fmt::Debug for SlabPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabPool")
            .field("base", &self.base)
            .field("masks", &self.masks)
            .finish_non_exhaustive()
    }
}

fn check_meta(slab: usize, meta: &SlabMeta) -> std::result::Result<(), IntegrityError> {
    if !meta.has_valid_signature() {
        return Err(IntegrityError::BadSignature {
            slab,
            found: meta.signature,
        });
    }
    if meta.free_mask & !USABLE_MASK != 0 {
        return Err(IntegrityError::ReservedSlotFree { slab });
    }
    if meta.free_count != meta.usable_popcount() {
        return Err(IntegrityError::CountMismatch {
            slab,
            free_count: meta.free_count,
            popcount: meta.usable_popcount(),
        });
    }
    Ok(())
}

/// Statistics for a slab pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub base: Address,
    pub masks: PoolMasks,
    pub allocated: usize,
    pub available: usize,
    pub slabs: Vec<SlabStats>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlabStats {
    pub index: usize,
    pub state: SlabState,
    pub free_count: u8,
    pub free_mask: u16,
    /// Signature and free count check out
    pub intact: bool,
}
