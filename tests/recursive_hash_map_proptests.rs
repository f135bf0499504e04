// RecursiveHashMap property tests through the public API.
//
// Property 1: behaves like std::collections::HashMap with insert-if-absent.
//  - Model: HashMap<String, u32>.
//  - Operations: insert, get-or-insert-default, erase, lookup, walk.
//  - Invariant: len(), contains_key() and at() agree with the model after
//    every step; a cursor walk visits each model key exactly once.
//
// Property 2: a copy never observes later mutations of its source.
use proptest::prelude::*;
use recursive_hashmap::{KeyNotFound, RecursiveHashMap};
use std::collections::{BTreeSet, HashMap};

proptest! {
    #[test]
    fn prop_matches_std_hashmap(
        keys in 1usize..=600,
        ops in proptest::collection::vec((0u8..=4u8, 0usize..600usize, any::<u32>()), 1..400),
    ) {
        let mut m: RecursiveHashMap<String, u32> = RecursiveHashMap::new();
        let mut model: HashMap<String, u32> = HashMap::new();

        for (op, raw_k, v) in ops {
            let key = format!("k{}", raw_k % keys);
            match op {
                // Insert only when absent.
                0 => {
                    let fresh = !model.contains_key(&key);
                    prop_assert_eq!(m.insert(key.clone(), v), fresh);
                    model.entry(key.clone()).or_insert(v);
                }
                // Autovivify, then bump.
                1 => {
                    *m.get_or_insert_default(key.clone()) += 1;
                    *model.entry(key.clone()).or_default() += 1;
                }
                // Erase.
                2 => {
                    prop_assert_eq!(m.erase(&key), model.remove(&key).is_some());
                }
                // Lookup through every accessor.
                3 => {
                    let expected = model.get(&key);
                    prop_assert_eq!(m.get(&key), expected);
                    prop_assert_eq!(m.at(&key).ok(), expected);
                    if expected.is_none() {
                        prop_assert_eq!(m.at(&key), Err(KeyNotFound));
                    }
                    prop_assert_eq!(m.find(&key).value(&m), expected);
                }
                // Cursor walk.
                _ => {
                    let mut seen = Vec::new();
                    let mut c = m.begin();
                    while !c.is_end() {
                        let (k, val) = c.entry(&m).unwrap();
                        prop_assert_eq!(model.get(k), Some(val));
                        seen.push(k.clone());
                        c = c.advance(&m);
                    }
                    prop_assert_eq!(seen.len(), model.len());
                    let unique: BTreeSet<_> = seen.into_iter().collect();
                    prop_assert_eq!(unique.len(), model.len());
                }
            }

            prop_assert_eq!(m.len(), model.len());
            prop_assert_eq!(m.contains_key(&key), model.contains_key(&key));
        }
    }
}

proptest! {
    #[test]
    fn prop_copy_is_independent(
        base in proptest::collection::btree_set(0u64..10_000, 0..800),
        extra in proptest::collection::vec(0u64..10_000, 0..200),
    ) {
        let mut src: RecursiveHashMap<u64, u64> = base.iter().map(|&k| (k, k)).collect();
        let copy = src.clone();
        prop_assert_eq!(&copy, &src);

        for k in &extra {
            if !src.erase(k) {
                src.insert(*k, 0);
            }
        }

        prop_assert_eq!(copy.len(), base.len());
        for k in &base {
            prop_assert_eq!(copy.get(k), Some(k));
        }
        let copied: BTreeSet<u64> = copy.keys().copied().collect();
        prop_assert_eq!(&copied, &base);
    }
}
