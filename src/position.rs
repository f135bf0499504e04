//! Bucket placement inside a sharded node.

use crate::config::SCRAMBLE_PRIMES;
use core::hash::{BuildHasher, Hash};

/// Hash a key once with the map's hasher. The result is stored next to the
/// entry and reused for every later placement.
#[inline]
pub(crate) fn make_hash<Q, S>(hasher: &S, q: &Q) -> u64
where
    Q: ?Sized + Hash,
    S: BuildHasher,
{
    hasher.hash_one(q)
}

/// Bucket of `hash` in a table of `table_size` slots at recursion `depth`.
///
/// Keys sharing a bucket at one level are pushed into the same child, so
/// every depth multiplies by its own prime before reducing. Plain
/// `hash % table_size` would send all of them to the same bucket again.
#[inline]
pub(crate) fn position_of(hash: u64, table_size: usize, depth: usize) -> usize {
    let size = table_size as u64;
    let scramble = SCRAMBLE_PRIMES[depth] % size;
    // Both factors are below 2^22 and 2^16, the product fits in u64.
    ((hash % size) * scramble % size) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CAPACITY_TIERS, MAX_DEPTH};
    use std::collections::BTreeSet;

    #[test]
    fn position_stays_in_range() {
        for &size in &CAPACITY_TIERS {
            for depth in 0..MAX_DEPTH {
                for hash in [0u64, 1, 12, 13, 977, u64::MAX, u64::MAX - 1] {
                    assert!(position_of(hash, size, depth) < size);
                }
            }
        }
    }

    #[test]
    fn zero_hash_lands_in_bucket_zero() {
        assert_eq!(position_of(0, 13, 0), 0);
        assert_eq!(position_of(0, 3365161, 4), 0);
    }

    /// Keys that collide at depth 0 spread out again at depth 1.
    #[test]
    fn colliding_keys_scatter_at_next_depth() {
        let size = CAPACITY_TIERS[1];
        let colliding: Vec<u64> = (0u64..10_000)
            .filter(|h| position_of(*h, size, 0) == 5)
            .take(40)
            .collect();
        assert_eq!(colliding.len(), 40);
        let child_buckets: BTreeSet<usize> = colliding
            .iter()
            .map(|h| position_of(*h, CAPACITY_TIERS[2], 1))
            .collect();
        assert!(child_buckets.len() > 10, "got {:?}", child_buckets);
    }

    #[test]
    fn make_hash_is_deterministic_per_hasher() {
        let s = std::collections::hash_map::RandomState::new();
        assert_eq!(make_hash(&s, "abc"), make_hash(&s, "abc"));
    }
}
