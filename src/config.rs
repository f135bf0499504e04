//! Static sizing tables shared by every node of the tree.

/// Number of recursion levels. Nodes live at depths `0..MAX_DEPTH`; a node
/// at `MAX_DEPTH - 1` always stores its entries in a flat list.
pub const MAX_DEPTH: usize = 5;

/// Load divisor. A node grows once `count * DENSITY_DIVISOR` reaches its
/// table size and shrinks once `occupied * DENSITY_DIVISOR²` falls to it.
pub const DENSITY_DIVISOR: usize = 4;

/// Number of capacity tiers.
pub const TIER_COUNT: usize = 16;

/// Prime table sizes, indexed by capacity tier.
pub const CAPACITY_TIERS: [usize; TIER_COUNT] = [
    13, 23, 73, 173, 401, 929, 2137, 4931, 11351, 26113, 60103, 138239, 318023, 731531,
    1463113, 3365161,
];

/// Per-depth multipliers used to scatter bucket positions. None of them
/// divides any entry of `CAPACITY_TIERS`, so a multiplier is never zero
/// modulo a table size.
pub const SCRAMBLE_PRIMES: [u64; MAX_DEPTH] = [34583, 24239, 131, 1031, 6761];

/// Flat-list overflow threshold: the tier-0 table size.
#[inline]
pub(crate) fn flat_limit() -> usize {
    CAPACITY_TIERS[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prime(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    #[test]
    fn tiers_are_ascending_primes() {
        for w in CAPACITY_TIERS.windows(2) {
            assert!(w[0] < w[1]);
        }
        for &size in &CAPACITY_TIERS {
            assert!(is_prime(size as u64), "{size} is not prime");
        }
    }

    #[test]
    fn scramble_primes_never_vanish_modulo_a_tier() {
        for &p in &SCRAMBLE_PRIMES {
            assert!(is_prime(p));
            for &size in &CAPACITY_TIERS {
                assert_ne!(p % size as u64, 0, "{p} vanishes modulo {size}");
            }
        }
    }
}
