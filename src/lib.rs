// bitslab - bitmask-driven fixed-size object slab allocator
//
// A 64 KiB pool of 16 slabs, each holding 15 objects of 256 bytes. All
// bookkeeping lives in bitmasks and a self-describing metadata slot per slab.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod slab;

// Re-exports for convenience
pub use config::PoolConfig;
pub use slab::{Address, PoolMasks, PoolStats, SharedPool, SlabMeta, SlabPool, SlabState, SlotId};

/// Allocator error types
pub mod error {
    use crate::slab::{Address, SlabState};
    use thiserror::Error;

    /// Why an allocation produced no address
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AllocError {
        #[error("Pool exhausted: every slab is full")]
        Exhausted,

        #[error("Slab {slab} metadata is corrupted")]
        Corrupted { slab: usize },

        #[error("Slab {slab} is marked available but has no free slot")]
        Inconsistent { slab: usize },
    }

    /// Why a release was refused
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ReleaseError {
        #[error("Address {address} does not name an object slot in this pool")]
        OutOfRange { address: Address },

        #[error("Slab {slab} metadata is corrupted")]
        Corrupted { slab: usize },

        #[error("Object at {address} is already free")]
        DoubleFree { address: Address },
    }

    /// Why object memory could not be accessed
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AccessError {
        #[error("Address {address} does not name an object slot in this pool")]
        OutOfRange { address: Address },

        #[error("Slab {slab} metadata is corrupted")]
        Corrupted { slab: usize },

        #[error("Object at {address} is not allocated")]
        NotAllocated { address: Address },
    }

    impl From<ReleaseError> for AccessError {
        fn from(err: ReleaseError) -> Self {
            match err {
                ReleaseError::OutOfRange { address } => AccessError::OutOfRange { address },
                ReleaseError::Corrupted { slab } => AccessError::Corrupted { slab },
                ReleaseError::DoubleFree { address } => AccessError::NotAllocated { address },
            }
        }
    }

    /// Pool invariant violations found by verification or recovery
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum IntegrityError {
        #[error("Slab {slab} signature mismatch: found {found:#010x}")]
        BadSignature { slab: usize, found: u32 },

        #[error("Slab {slab} metadata slot is marked free")]
        ReservedSlotFree { slab: usize },

        #[error("Slab {slab} free count {free_count} disagrees with mask population {popcount}")]
        CountMismatch {
            slab: usize,
            free_count: u8,
            popcount: u8,
        },

        #[error("Slab {slab} should be {expected} but pool masks say {found:?}")]
        CategoryMismatch {
            slab: usize,
            expected: SlabState,
            found: Option<SlabState>,
        },

        #[error("Pool image is {actual} bytes, expected {expected}")]
        WrongImageSize { expected: usize, actual: usize },
    }

    /// Configuration loading and validation failures
    #[derive(Error, Debug)]
    pub enum ConfigError {
        #[error("Failed to read config: {0}")]
        Io(#[from] std::io::Error),

        #[error("Failed to parse config: {0}")]
        Parse(#[from] toml::de::Error),

        #[error("Invalid base address {base:#x}: {reason}")]
        InvalidBase { base: u64, reason: &'static str },
    }

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Allocation failed: {0}")]
        Alloc(#[from] AllocError),

        #[error("Release failed: {0}")]
        Release(#[from] ReleaseError),

        #[error("Access failed: {0}")]
        Access(#[from] AccessError),

        #[error("Integrity check failed: {0}")]
        Integrity(#[from] IntegrityError),

        #[error("Configuration error: {0}")]
        Config(#[from] ConfigError),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
