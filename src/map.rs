//! RecursiveHashMap: public layer. Owns the hasher, hashes each key once,
//! and hands the hash to the tree.

use crate::cursor::Cursor;
use crate::iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::position::make_hash;
use crate::shard_tree::{Entry, ShardTree};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;

/// Lookup error returned by [`RecursiveHashMap::at`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyNotFound;

impl fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl std::error::Error for KeyNotFound {}

/// Hash map whose crowded buckets become nested maps. `insert` never
/// overwrites; cursors and iterators walk entries in bucket order.
pub struct RecursiveHashMap<K, V, S = RandomState> {
    hasher: S,
    tree: ShardTree<K, V>,
}

impl<K, V> RecursiveHashMap<K, V>
where
    K: Eq + Hash,
{
    /// Empty map with a single flat root and a fresh `RandomState`.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> Default for RecursiveHashMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> RecursiveHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            tree: ShardTree::new(),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Number of entries in the whole tree.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Drop every entry and return to a single empty flat node.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Cursor at the first entry, or [`Cursor::END`] when empty.
    pub fn begin(&self) -> Cursor {
        Cursor::begin_at(&self.tree, self.tree.root(), 0)
    }

    pub fn end(&self) -> Cursor {
        Cursor::END
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.tree)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.tree)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    pub(crate) fn tree(&self) -> &ShardTree<K, V> {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut ShardTree<K, V> {
        &mut self.tree
    }
}

impl<K, V, S> RecursiveHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Insert `key -> value`. Returns `false`, leaving the stored value
    /// untouched, when the key is already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = make_hash(&self.hasher, &key);
        self.tree.insert(Entry { key, value, hash }).is_ok()
    }

    /// Like `insert`, but only runs `default` when the key is absent.
    pub fn insert_with<F>(&mut self, key: K, default: F) -> bool
    where
        F: FnOnce() -> V,
    {
        let hash = make_hash(&self.hasher, &key);
        if self.tree.locate(hash, &key).is_some() {
            return false;
        }
        let value = default();
        self.tree.insert(Entry { key, value, hash }).is_ok()
    }

    /// Value for `q`, if present.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = make_hash(&self.hasher, q);
        self.tree.find(hash, q).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = make_hash(&self.hasher, q);
        self.tree.find_mut(hash, q).map(|e| &mut e.value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = make_hash(&self.hasher, q);
        self.tree.find(hash, q).map(|e| (&e.key, &e.value))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = make_hash(&self.hasher, q);
        self.tree.locate(hash, q).is_some()
    }

    /// Cursor at the entry for `q`, or [`Cursor::END`] when absent.
    pub fn find<Q>(&self, q: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = make_hash(&self.hasher, q);
        match self.tree.locate(hash, q) {
            Some((node, index)) => Cursor::at(self.tree.stamp(), node, index, 0),
            None => Cursor::END,
        }
    }

    pub fn at<Q>(&self, q: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(KeyNotFound)
    }

    /// Value for `key`, inserting `V::default()` first when absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = make_hash(&self.hasher, &key);
        let (node, index) = match self.tree.locate(hash, &key) {
            Some(slot) => slot,
            None => {
                let value = default();
                match self.tree.insert_tracked(Entry { key, value, hash }) {
                    Ok(slot) => slot,
                    Err(_) => unreachable!("key was absent"),
                }
            }
        };
        match self.tree.entry_mut(node, index) {
            Some(entry) => &mut entry.value,
            None => unreachable!("located entry must exist"),
        }
    }

    /// Remove the entry for `q` and return its value. Emptied nodes are
    /// freed and sparse ones shrink.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = make_hash(&self.hasher, q);
        self.tree.remove(hash, q).map(|e| (e.key, e.value))
    }

    /// Remove the entry for `q`. Returns `false` when it was absent.
    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).is_some()
    }
}

impl<K, V, S> Clone for RecursiveHashMap<K, V, S>
where
    K: Eq + Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        let mut out = Self::with_hasher(self.hasher.clone());
        out.clone_from(self);
        out
    }

    /// Rebuild `self` from `source` by reinsertion. A sharded source keeps
    /// its root capacity tier so the copy skips the growth steps. Stored
    /// hashes are reused; neither `K: Hash` nor `K: Eq` is called.
    fn clone_from(&mut self, source: &Self) {
        self.hasher = source.hasher.clone();
        self.tree = ShardTree::with_root_tier(source.tree.root_tier());
        for (key, value, hash) in source.tree_entries() {
            self.tree.insert_unique(Entry {
                key: key.clone(),
                value: value.clone(),
                hash,
            });
        }
    }
}

impl<K, V, S> RecursiveHashMap<K, V, S> {
    fn tree_entries(&self) -> impl Iterator<Item = (&K, &V, u64)> + '_ {
        let mut cursor = self.begin();
        core::iter::from_fn(move || {
            let (node, index) = cursor.slot_in(&self.tree)?;
            let e = self.tree.entry(node, index)?;
            cursor = cursor.advance_in(&self.tree);
            Some((&e.key, &e.value, e.hash))
        })
    }
}

impl<K, V, S> PartialEq for RecursiveHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K, V, S> Eq for RecursiveHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> fmt::Debug for RecursiveHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for RecursiveHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for RecursiveHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Repeated `insert`: the first value seen for a key wins.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for RecursiveHashMap<K, V>
where
    K: Eq + Hash,
{
    fn from(arr: [(K, V); N]) -> Self {
        arr.into_iter().collect()
    }
}

impl<K, Q, V, S> Index<&Q> for RecursiveHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    /// Panics when the key is absent; see [`RecursiveHashMap::at`].
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in RecursiveHashMap")
    }
}

impl<K, V, S> IntoIterator for RecursiveHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.tree)
    }
}

impl<'a, K, V, S> IntoIterator for &'a RecursiveHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut RecursiveHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
