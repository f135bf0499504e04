//! recursive-hashmap: a single-threaded hash map whose overflowing buckets
//! turn into nested hash maps instead of triggering a global rehash.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map where growth stays local. A node holds a short flat list
//!   until it gets dense, then becomes a table of child nodes, each of which
//!   is again a full node with the same policy.
//! - Layers:
//!   - ShardTree<K, V>: structural layer. Nodes live in a `slotmap` arena
//!     and are addressed by precomputed `u64` hashes. Owns the resize
//!     policy (expand/reduce) and the parent links used for traversal.
//!   - Cursor: a `(node, index, anchor)` position that can climb parent
//!     links to find the next entry of the whole tree.
//!   - RecursiveHashMap<K, V, S>: public API. Owns the `BuildHasher`,
//!     hashes each key once and hands the hash down.
//!
//! Node shapes
//! - Flat: entries stored in insertion order in a `Vec`. Every node starts
//!   flat; a node at depth `MAX_DEPTH - 1` stays flat forever.
//! - Sharded: a boxed slice of optional child ids sized to the prime of
//!   the node's capacity tier. Children are created on first insert into
//!   their slot and freed as soon as they become empty.
//!
//! Resize policy
//! - Grow when `count * 4 >= 13` (flat) or `occupied * 4 >= table_size`
//!   (sharded). Growing moves one tier up and reinserts the whole subtree.
//! - Shrink when `occupied * 16 <= table_size` after a child was freed.
//!   The asymmetric factor keeps a node from bouncing between two tiers.
//!   A node at tier 1 or below with fewer than four entries folds back to
//!   a flat list, as does any sharded node left empty.
//! - At the largest tier growth stops; chains simply get longer.
//!
//! Placement
//! - `bucket = (hash % size) * (prime[depth] % size) % size`. The prime
//!   changes per depth so keys sharing a bucket do not share it again one
//!   level down.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its `u64` hash; repositioning during resize and
//!   copying reuse it, so `K: Hash` is called once per public operation.
//! - Resizing moves entries already known to be unique and skips the
//!   duplicate scan, so `K: Eq` runs only on lookups and fresh inserts.
//!
//! Ownership
//! - The arena owns every node; a parent's slot is the only path that
//!   reaches a child, and parent links are plain ids used for navigation.
//!   Freeing a node frees its whole subtree.
//!
//! Notes and non-goals
//! - Not thread-safe; callers serialize access.
//! - Any mutation invalidates outstanding cursors. A stale cursor never
//!   aliases a node allocated later (generational ids) but may point to a
//!   different entry of a surviving node.
//! - No serialization.

mod config;
mod cursor;
mod iter;
mod map;
mod position;
mod shard_tree;
mod shard_tree_proptest;

// Public surface
pub use config::{CAPACITY_TIERS, DENSITY_DIVISOR, MAX_DEPTH, SCRAMBLE_PRIMES};
pub use cursor::Cursor;
pub use iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
pub use map::{KeyNotFound, RecursiveHashMap};
