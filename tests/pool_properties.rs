//! Property tests: pool invariants under random operation sequences

use bitslab::slab::{SlabMeta, OBJECTS_PER_SLAB, POOL_CAPACITY, SLAB_COUNT, SLOTS_PER_SLAB};
use bitslab::{Address, PoolConfig, SlabPool, SlabState};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Allocate,
    /// Release the n-th live address (modulo the live count)
    Release(usize),
    /// Release an arbitrary address, usually not ours
    ReleaseRaw(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => Just(Op::Allocate),
        4 => any::<usize>().prop_map(Op::Release),
        1 => (0x0FFF_F000u64..0x1001_1000).prop_map(Op::ReleaseRaw),
    ]
}

fn check_invariants(pool: &SlabPool) -> Result<(), TestCaseError> {
    let masks = pool.masks();
    prop_assert!(masks.is_exclusive(), "masks overlap: {:?}", masks);
    for slab in 0..SLAB_COUNT {
        let meta = pool.slab_meta(slab).unwrap();
        prop_assert_eq!(meta.free_count, meta.usable_popcount());
        prop_assert_eq!(
            pool.slab_state(slab),
            Some(SlabState::from_free_count(meta.free_count))
        );
        prop_assert_eq!(SlabMeta::decode(meta.encode()), meta);
    }
    prop_assert!(pool.verify().is_ok());
    Ok(())
}

proptest! {
    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(op(), 1..400)) {
        let mut pool = SlabPool::new(&PoolConfig::default()).unwrap();
        let mut live: Vec<Address> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate => match pool.allocate() {
                    Some(address) => {
                        prop_assert!(!live.contains(&address));
                        live.push(address);
                    }
                    None => prop_assert_eq!(live.len(), POOL_CAPACITY),
                },
                Op::Release(n) => {
                    if !live.is_empty() {
                        let address = live.swap_remove(n % live.len());
                        prop_assert!(pool.release(address).is_ok());
                    }
                }
                Op::ReleaseRaw(raw) => {
                    let address = Address(raw);
                    let result = pool.release(address);
                    if let Some(pos) = live.iter().position(|a| *a == address) {
                        prop_assert!(result.is_ok());
                        live.swap_remove(pos);
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
            }
            check_invariants(&pool)?;
            prop_assert_eq!(pool.allocated(), live.len());
        }
    }

    #[test]
    fn prop_allocation_is_first_fit(prefill in 0usize..POOL_CAPACITY, hole in any::<prop::sample::Index>()) {
        let mut pool = SlabPool::new(&PoolConfig::default()).unwrap();
        let mut live = Vec::new();
        for _ in 0..=prefill {
            live.push(pool.allocate().unwrap());
        }

        // Punching one hole makes that slab partial; the next allocation
        // must land in the lowest partial slab's lowest free slot.
        let victim = live[hole.index(live.len())];
        pool.release(victim).unwrap();
        let masks = pool.masks();
        let expected_slab = masks.select_slab().unwrap();
        let meta = pool.slab_meta(expected_slab).unwrap();
        let expected_slot = meta.first_free_slot().unwrap();

        let got = pool.allocate().unwrap();
        let offset = got.get() - pool.base().get();
        prop_assert_eq!(offset as usize / 4096, expected_slab);
        prop_assert_eq!((offset as usize % 4096) / 256, expected_slot);
        prop_assert!(expected_slot >= 1 && expected_slot < SLOTS_PER_SLAB);
    }

    #[test]
    fn prop_metadata_round_trip(mask in 0u16..=0x7FFF) {
        let meta = SlabMeta {
            free_count: mask.count_ones() as u8,
            free_mask: mask,
            signature: bitslab::slab::SIGNATURE,
        };
        prop_assert!(usize::from(meta.free_count) <= OBJECTS_PER_SLAB);
        prop_assert_eq!(SlabMeta::decode(meta.encode()), meta);

        let mut slot = [0u8; 256];
        meta.write_to(&mut slot);
        prop_assert_eq!(SlabMeta::read_from(&slot), meta);
    }
}
