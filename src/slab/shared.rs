//! Thread-safe handle to a slab pool
//!
//! Allocate and release both touch the pool masks and a slab's metadata in
//! one step, so the whole pool sits behind a single mutex.

use super::pool::{PoolStats, SlabPool};
use super::slot::Address;
use crate::error::{AllocError, IntegrityError, ReleaseError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable, lock-protected [`SlabPool`]
#[derive(Debug, Clone)]
pub struct SharedPool {
    inner: Arc<Mutex<SlabPool>>,
}

impl SharedPool {
    /// Wrap an existing pool
    pub fn new(pool: SlabPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    pub fn allocate(&self) -> Option<Address> {
        self.inner.lock().allocate()
    }

    pub fn try_allocate(&self) -> Result<Address, AllocError> {
        self.inner.lock().try_allocate()
    }

    pub fn release(&self, address: Address) -> Result<(), ReleaseError> {
        self.inner.lock().release(address)
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }

    pub fn verify(&self) -> Result<(), IntegrityError> {
        self.inner.lock().verify()
    }

    /// Run `f` with exclusive access to the pool
    ///
    /// Use this to touch object bytes or to combine several operations
    /// into one critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut SlabPool) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Unwrap the pool if this is the last handle
    pub fn into_inner(self) -> Result<SlabPool, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<SlabPool> for SharedPool {
    fn from(pool: SlabPool) -> Self {
        Self::new(pool)
    }
}
