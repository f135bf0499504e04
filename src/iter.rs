//! Iterators over `RecursiveHashMap`. All of them yield entries in cursor
//! order: bucket order at each level, depth first.

use crate::cursor::Cursor;
use crate::shard_tree::{Entry, ShardTree};
use core::iter::FusedIterator;

/// Iterator over immutable entries.
pub struct Iter<'a, K, V> {
    tree: &'a ShardTree<K, V>,
    cursor: Cursor,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(tree: &'a ShardTree<K, V>) -> Self {
        Self {
            tree,
            cursor: Cursor::begin_at(tree, tree.root(), 0),
            remaining: tree.len(),
        }
    }
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, index) = self.cursor.slot_in(self.tree)?;
        let entry = self.tree.entry(node, index)?;
        self.cursor = self.cursor.advance_in(self.tree);
        self.remaining -= 1;
        Some((&entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Iterator over entries with mutable values.
pub struct IterMut<'a, K, V> {
    leaves: std::vec::IntoIter<&'a mut [Entry<K, V>]>,
    current: core::slice::IterMut<'a, Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(tree: &'a mut ShardTree<K, V>) -> Self {
        let remaining = tree.len();
        Self {
            leaves: tree.leaves_mut().into_iter(),
            current: Default::default(),
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.current.next() {
                self.remaining -= 1;
                return Some((&e.key, &mut e.value));
            }
            self.current = self.leaves.next()?.into_iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}
impl<'a, K, V> FusedIterator for IterMut<'a, K, V> {}

/// Owning iterator.
pub struct IntoIter<K, V> {
    inner: std::vec::IntoIter<Entry<K, V>>,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(mut tree: ShardTree<K, V>) -> Self {
        Self {
            inner: tree.drain_all().into_iter(),
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (e.key, e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

/// Iterator over keys, in cursor order.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> ExactSizeIterator for Keys<'a, K, V> {}
impl<'a, K, V> FusedIterator for Keys<'a, K, V> {}

/// Iterator over values, in cursor order.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> ExactSizeIterator for Values<'a, K, V> {}
impl<'a, K, V> FusedIterator for Values<'a, K, V> {}

/// Iterator over mutable values, in cursor order.
pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> ExactSizeIterator for ValuesMut<'a, K, V> {}
impl<'a, K, V> FusedIterator for ValuesMut<'a, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tree_with(n: u64) -> ShardTree<u64, u64> {
        let mut t = ShardTree::new();
        for k in 0..n {
            let hash = k.wrapping_mul(0xD6E8_FEB8_6659_FD93);
            assert!(t.insert(Entry { key: k, value: k * 2, hash }).is_ok());
        }
        t
    }

    #[test]
    fn iter_reports_exact_len() {
        let t = tree_with(321);
        let mut it = Iter::new(&t);
        assert_eq!(it.len(), 321);
        it.next();
        assert_eq!(it.len(), 320);
        assert_eq!(it.count(), 320);
    }

    /// Invariant: `Iter` and `IterMut` walk the same order.
    #[test]
    fn iter_and_iter_mut_agree_on_order() {
        let mut t = tree_with(900);
        let order: Vec<u64> = Iter::new(&t).map(|(k, _)| *k).collect();
        let order_mut: Vec<u64> = IterMut::new(&mut t).map(|(k, _)| *k).collect();
        assert_eq!(order, order_mut);
    }

    #[test]
    fn into_iter_yields_everything() {
        let t = tree_with(500);
        let got: BTreeMap<u64, u64> = IntoIter::new(t).collect();
        assert_eq!(got.len(), 500);
        assert!(got.iter().all(|(k, v)| *v == k * 2));
    }

    #[test]
    fn fused_after_end() {
        let t = tree_with(5);
        let mut it = Iter::new(&t);
        for _ in 0..5 {
            assert!(it.next().is_some());
        }
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }
}
