#![cfg(test)]

// Property tests for RecursiveHashMap kept inside the crate so they can
// check the tree's structural invariants after every step.

use crate::config::MAX_DEPTH;
use crate::map::RecursiveHashMap;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations: indices shrink to earlier keys and op lists
// shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Remove(usize),
    Get(usize),
    Autovivify(usize),
    Mutate(usize, i32),
    Iterate,
    CloneCheck,
}

fn arb_scenario(max_pool: usize) -> impl Strategy<Value = (usize, Vec<OpI>)> {
    (1usize..=max_pool).prop_flat_map(|pool| {
        let idx = 0..pool;
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Get),
            1 => idx.clone().prop_map(OpI::Autovivify),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::CloneCheck),
        ];
        proptest::collection::vec(op, 1..300).prop_map(move |ops| (pool, ops))
    })
}

fn run_scenario<S>(mut sut: RecursiveHashMap<u32, i32, S>, ops: Vec<OpI>) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model: HashMap<u32, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = i as u32;
                let already = model.contains_key(&k);
                prop_assert_eq!(sut.insert(k, v), !already);
                model.entry(k).or_insert(v);
            }
            OpI::InsertWith(i, v) => {
                let k = i as u32;
                let already = model.contains_key(&k);
                prop_assert_eq!(sut.insert_with(k, || v), !already);
                model.entry(k).or_insert(v);
            }
            OpI::Remove(i) => {
                let k = i as u32;
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                prop_assert!(!sut.contains_key(&k));
            }
            OpI::Get(i) => {
                let k = i as u32;
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.at(&k).ok(), model.get(&k));
            }
            OpI::Autovivify(i) => {
                let k = i as u32;
                let expected = *model.entry(k).or_default();
                prop_assert_eq!(*sut.get_or_insert_default(k), expected);
            }
            OpI::Mutate(i, d) => {
                let k = i as u32;
                match (sut.get_mut(&k), model.get_mut(&k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.wrapping_add(d);
                        *mv = mv.wrapping_add(d);
                    }
                    (None, None) => {}
                    (s, m) => {
                        prop_assert!(false, "presence mismatch: {:?} vs {:?}", s, m);
                    }
                }
            }
            OpI::Iterate => {
                let seen: Vec<(u32, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
                let unique: BTreeSet<u32> = seen.iter().map(|(k, _)| *k).collect();
                prop_assert_eq!(unique.len(), seen.len(), "each entry visited once");
                let as_map: BTreeMap<u32, i32> = seen.into_iter().collect();
                let expected: BTreeMap<u32, i32> = model.iter().map(|(k, v)| (*k, *v)).collect();
                prop_assert_eq!(as_map, expected);
            }
            OpI::CloneCheck => {
                let mut copy = sut.clone();
                copy.tree().check_invariants();
                prop_assert!(copy == sut);
                copy.insert(u32::MAX, 0);
                copy.clear();
                prop_assert_eq!(sut.len(), model.len());
            }
        }

        // Post-conditions after each op
        sut.tree().check_invariants();
        prop_assert!(sut.tree().max_node_depth() < MAX_DEPTH);
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert_eq!(sut.iter().count(), model.len());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Keys are unique; duplicate inserts are refused without updating.
// - `len` equals the model size and the number of entries a walk yields.
// - Every structural invariant of the tree holds after each step.
// - Copies compare equal and are independent of their source.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((_pool, ops) in arb_scenario(400)) {
        run_scenario(RecursiveHashMap::new(), ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one route
// and the tree bottoms out at its deepest flat node.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Low-entropy variant: hashes fall into 7 classes, so some buckets stay
// crowded and nodes nest a few levels deep.
#[derive(Clone, Default)]
struct CoarseBuildHasher;
struct CoarseHasher(u64);
impl BuildHasher for CoarseBuildHasher {
    type Hasher = CoarseHasher;
    fn build_hasher(&self) -> Self::Hasher {
        CoarseHasher(0)
    }
}
impl Hasher for CoarseHasher {
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = self.0.wrapping_add(*b as u64);
        }
    }
    fn finish(&self) -> u64 {
        self.0 % 7
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((_pool, ops) in arb_scenario(64)) {
        run_scenario(RecursiveHashMap::with_hasher(ConstBuildHasher), ops)?;
    }

    #[test]
    fn prop_state_machine_with_coarse_hash((_pool, ops) in arb_scenario(200)) {
        run_scenario(RecursiveHashMap::with_hasher(CoarseBuildHasher), ops)?;
    }
}

// Property: growing then shrinking symmetrically brings the root back to
// a flat node and keeps every remaining key findable along the way.
proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]
    #[test]
    fn prop_resize_is_reversible(n in 4usize..3_000, seed in any::<u64>()) {
        let mut m: RecursiveHashMap<u64, u64> = RecursiveHashMap::new();
        let keys: Vec<u64> = (0..n as u64).map(|i| i.wrapping_mul(seed | 1)).collect();
        for &k in &keys {
            prop_assert!(m.insert(k, k));
        }
        prop_assert!(m.tree().root_tier() >= 1);
        for (i, &k) in keys.iter().enumerate().rev() {
            prop_assert_eq!(m.remove(&k), Some(k));
            if i % 64 == 0 {
                for &rest in &keys[..i] {
                    prop_assert_eq!(m.get(&rest), Some(&rest));
                }
            }
        }
        prop_assert!(m.is_empty());
        prop_assert_eq!(m.tree().root_tier(), 0);
        prop_assert_eq!(m.tree().node_count(), 1);
    }
}
