//! End-to-end pool scenarios
//!
//! These tests drive a pool through full lifecycles and check the pool
//! invariants after every step.

#[cfg(test)]
mod scenarios {
    use crate::config::PoolConfig;
    use crate::slab::{Address, SlabPool, SlabState, OBJECTS_PER_SLAB, POOL_CAPACITY, SLAB_COUNT};

    fn assert_invariants(pool: &SlabPool) {
        let masks = pool.masks();
        assert!(masks.is_exclusive(), "masks overlap: {:?}", masks);
        for slab in 0..SLAB_COUNT {
            let meta = pool.slab_meta(slab).unwrap();
            assert_eq!(meta.free_count, meta.usable_popcount(), "slab {}", slab);
            assert_eq!(
                pool.slab_state(slab),
                Some(SlabState::from_free_count(meta.free_count)),
                "slab {}",
                slab
            );
        }
        pool.verify().expect("pool should verify");
    }

    #[test]
    fn test_fill_slab_then_spill() {
        let mut pool = SlabPool::new(&PoolConfig::default()).unwrap();
        let base = pool.base().get();

        let first = pool.allocate().unwrap();
        assert_eq!(first, Address(base + 256));
        assert_eq!(pool.slab_state(0), Some(SlabState::Partial));
        assert_eq!(pool.slab_meta(0).unwrap().free_count, 14);

        for i in 2..=OBJECTS_PER_SLAB as u64 {
            assert_eq!(pool.allocate(), Some(Address(base + i * 256)));
            assert_invariants(&pool);
        }
        assert_eq!(pool.slab_state(0), Some(SlabState::Full));
        assert_eq!(pool.slab_meta(0).unwrap().free_count, 0);

        let spilled = pool.allocate().unwrap();
        assert_eq!(spilled, Address(base + 4096 + 256));
        assert_eq!(pool.slab_state(1), Some(SlabState::Partial));

        pool.release(first).unwrap();
        assert_eq!(pool.slab_state(0), Some(SlabState::Partial));
        assert_eq!(pool.slab_meta(0).unwrap().free_count, 1);
        assert_invariants(&pool);

        // Partial slabs are preferred lowest index first, so slab 0 refills.
        assert_eq!(pool.allocate(), Some(first));
        assert_eq!(pool.slab_state(0), Some(SlabState::Full));
    }

    #[test]
    fn test_exhaust_and_drain() {
        let mut pool = SlabPool::new(&PoolConfig::default()).unwrap();

        let mut addresses = Vec::with_capacity(POOL_CAPACITY);
        while let Some(address) = pool.allocate() {
            addresses.push(address);
        }
        assert_eq!(addresses.len(), POOL_CAPACITY);
        assert_eq!(pool.masks().full, 0xFFFF);
        assert_invariants(&pool);

        // Allocation order walks slabs and slots in address order.
        assert!(addresses.windows(2).all(|w| w[0] < w[1]));

        for address in addresses.iter().rev() {
            pool.release(*address).unwrap();
            assert_invariants(&pool);
        }
        assert_eq!(pool.masks().empty, 0xFFFF);
        assert_eq!(pool.available(), POOL_CAPACITY);
    }

    #[test]
    fn test_partial_preferred_over_empty() {
        let mut pool = SlabPool::new(&PoolConfig::default()).unwrap();
        let base = pool.base().get();

        let mut slab0 = Vec::new();
        for _ in 0..OBJECTS_PER_SLAB {
            slab0.push(pool.allocate().unwrap());
        }
        let in_slab1 = pool.allocate().unwrap();
        let in_slab1_next = pool.allocate().unwrap();

        // Slab 1 is partial and slab 0 becomes partial again: lowest wins.
        pool.release(slab0[4]).unwrap();
        assert_eq!(pool.allocate(), Some(slab0[4]));

        // With slab 0 full the partial slab 1 is used before empty slab 2.
        pool.release(in_slab1).unwrap();
        assert_eq!(pool.allocate(), Some(in_slab1));
        assert_eq!(pool.allocate(), Some(Address(base + 4096 + 3 * 256)));
        assert!(in_slab1_next < Address(base + 4096 + 3 * 256));
        assert_invariants(&pool);
    }

    #[test]
    fn test_rejections_leave_pool_untouched() {
        let mut pool = SlabPool::new(&PoolConfig::with_base(0x8000)).unwrap();
        let a = pool.allocate().unwrap();
        let before = pool.as_bytes().to_vec();
        let masks = pool.masks();

        assert!(pool.release(Address(0x8000 - 1)).is_err());
        assert!(pool.release(Address(0x8000 + 65536)).is_err());
        assert!(pool.release(Address(0x8000)).is_err());
        assert!(pool.release(Address(a.get() + 1)).is_err());
        assert!(pool.release(Address(a.get() + 256)).is_err());

        assert_eq!(pool.as_bytes(), &before[..]);
        assert_eq!(pool.masks(), masks);
    }
}
