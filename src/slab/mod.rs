//! Slab Pool
//!
//! A fixed 64 KiB pool split into 16 slabs of 16 slots each. Slot 0 of
//! every slab holds that slab's metadata; slots 1-15 are handed out as
//! 256-byte objects.
//!
//! # Architecture
//!
//! ```text
//! SlabPool
//!   ├─→ PoolMasks   full=0x8000 partial=0x4000 empty=0x3FFF
//!   └─→ memory (16 x 4096 bytes)
//!        ├─→ slab 0: [meta|obj|obj|...|obj]   free_count=0
//!        ├─→ slab 1: [meta|obj|   |...|   ]   free_count=14
//!        └─→ slab 2..15: [meta|   |...|   ]   free_count=15
//! ```
//!
//! Allocation picks the lowest partial slab (else the lowest empty one)
//! and its lowest free slot. Release validates the address, the slab
//! signature, and the slot's free bit before handing the slot back.

pub mod bench;
pub mod masks;
pub mod metadata;
pub mod pool;
pub mod scenario_tests;
pub mod shared;
pub mod slot;

pub use masks::{PoolMasks, SlabState};
pub use metadata::{SlabMeta, SIGNATURE};
pub use pool::{PoolStats, SlabPool, SlabStats};
pub use shared::SharedPool;
pub use slot::{
    Address, SlotId, OBJECTS_PER_SLAB, POOL_CAPACITY, POOL_SIZE, SLAB_COUNT, SLAB_SIZE,
    SLOTS_PER_SLAB, SLOT_SIZE,
};
