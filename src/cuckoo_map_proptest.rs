#![cfg(test)]

// Property tests for CuckooMap kept inside the crate so they can pin the
// injected RNG without exposing internals.

use crate::cuckoo_map::CuckooMap;
use crate::policy::BytesPolicy;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

// Pool-indexed operations so shrinking collapses toward few keys and
// short op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, u64),
    Remove(usize),
    Lookup(usize),
    LookupInto(usize),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<u64>, Vec<Op>)> {
    proptest::collection::btree_set(1u64..1_000_000, 1..=24).prop_flat_map(|pool| {
        let pool: Vec<u64> = pool.into_iter().collect();
        let idx = 0..pool.len();
        let op = prop_oneof![
            (idx.clone(), any::<u64>()).prop_map(|(i, v)| Op::Insert(i, v)),
            idx.clone().prop_map(Op::Remove),
            idx.clone().prop_map(Op::Lookup),
            idx.clone().prop_map(Op::LookupInto),
            Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: state-machine equivalence against std::collections::HashMap
// with first-value-wins insert semantics. Invariants exercised across
// random operation sequences:
// - Insert is idempotent and never overwrites; lookups agree with the
//   model after every op.
// - Remove agrees with the model on its return value and on the key's
//   subsequent absence.
// - len() matches the model's size; iteration yields exactly the model's
//   key set with the model's values.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(), rng_seed in any::<u64>()) {
        let mut sut: CuckooMap<BytesPolicy, StdRng> = CuckooMap::with_policy_and_rng(
            8, 8, 8, BytesPolicy, StdRng::seed_from_u64(rng_seed),
        ).unwrap();
        let mut model: HashMap<u64, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let key = pool[i];
                    sut.insert(&key.to_ne_bytes(), &v.to_ne_bytes()).unwrap();
                    model.entry(key).or_insert(v);
                }
                Op::Remove(i) => {
                    let key = pool[i];
                    let removed = sut.remove(&key.to_ne_bytes());
                    prop_assert_eq!(removed, model.remove(&key).is_some());
                }
                Op::Lookup(i) => {
                    let key = pool[i];
                    let got = sut
                        .lookup(&key.to_ne_bytes())
                        .map(|v| u64::from_ne_bytes(v.try_into().unwrap()));
                    prop_assert_eq!(got, model.get(&key).copied());
                }
                Op::LookupInto(i) => {
                    let key = pool[i];
                    let mut out = [0u8; 8];
                    let hit = sut.lookup_into(&key.to_ne_bytes(), &mut out);
                    match model.get(&key) {
                        Some(&v) => {
                            prop_assert!(hit);
                            prop_assert_eq!(u64::from_ne_bytes(out), v);
                        }
                        None => prop_assert!(!hit),
                    }
                }
                Op::Iterate => {
                    let mut seen: HashMap<u64, u64> = HashMap::new();
                    for (k, v) in sut.iter() {
                        let k = u64::from_ne_bytes(k.try_into().unwrap());
                        let v = u64::from_ne_bytes(v.try_into().unwrap());
                        prop_assert!(seen.insert(k, v).is_none(), "duplicate key in iter");
                    }
                    prop_assert_eq!(&seen, &model);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
        }
    }
}

// Property: under sustained insert pressure the map grows through several
// capacities and never loses a mapping. Exercises the load-factor trigger
// and the mandatory rehash after each doubling.
proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]
    #[test]
    fn prop_growth_preserves_mappings(rng_seed in any::<u64>(), base in any::<u64>()) {
        let mut sut: CuckooMap<BytesPolicy, StdRng> = CuckooMap::with_policy_and_rng(
            8, 8, 8, BytesPolicy, StdRng::seed_from_u64(rng_seed),
        ).unwrap();

        let keys: Vec<u64> = (0..800u64).map(|i| base.wrapping_add(i.wrapping_mul(0x9e37_79b9_7f4a_7c15))).collect();
        for (i, key) in keys.iter().enumerate() {
            sut.insert(&key.to_ne_bytes(), &(i as u64).to_ne_bytes()).unwrap();
        }
        prop_assert_eq!(sut.len(), keys.len());
        for (i, key) in keys.iter().enumerate() {
            let got = sut
                .lookup(&key.to_ne_bytes())
                .map(|v| u64::from_ne_bytes(v.try_into().unwrap()));
            prop_assert_eq!(got, Some(i as u64));
        }
    }
}
