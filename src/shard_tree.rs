//! ShardTree: structural layer. Nodes live in a slot arena and are
//! addressed by precomputed hashes; the public map supplies the hasher.

use crate::config::{flat_limit, CAPACITY_TIERS, DENSITY_DIVISOR, MAX_DEPTH, TIER_COUNT};
use crate::cursor::Cursor;
use crate::position::position_of;
use core::borrow::Borrow;
use core::mem;
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tracing::{debug, trace};

new_key_type! {
    /// Arena address of a node. Generational, so a freed node's id never
    /// resolves to a node allocated later.
    pub(crate) struct NodeId;
}

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
}

/// Navigation link from a child to the slot holding it. Never owning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Link {
    pub(crate) parent: NodeId,
    pub(crate) slot: usize,
}

#[derive(Debug)]
pub(crate) struct Shards {
    children: Box<[Option<NodeId>]>,
    occupied: usize,
}

impl Shards {
    fn new(table_size: usize) -> Self {
        Self {
            children: vec![None; table_size].into_boxed_slice(),
            occupied: 0,
        }
    }

    pub(crate) fn get(&self, slot: usize) -> Option<NodeId> {
        self.children[slot]
    }

    /// First present child at a slot `>= from`.
    pub(crate) fn next_present(&self, from: usize) -> Option<(usize, NodeId)> {
        self.children
            .get(from..)?
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.map(|c| (from + i, c)))
    }
}

#[derive(Debug)]
pub(crate) enum Body<K, V> {
    Flat(Vec<Entry<K, V>>),
    Sharded(Shards),
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) body: Body<K, V>,
    pub(crate) len: usize,
    pub(crate) depth: usize,
    pub(crate) tier: usize,
    pub(crate) parent: Option<Link>,
}

impl<K, V> Node<K, V> {
    fn flat(depth: usize, parent: Option<Link>) -> Self {
        debug_assert!(depth < MAX_DEPTH);
        Self {
            body: Body::Flat(Vec::new()),
            len: 0,
            depth,
            tier: 0,
            parent,
        }
    }

    pub(crate) fn table_size(&self) -> usize {
        CAPACITY_TIERS[self.tier]
    }

    fn at_max_depth(&self) -> bool {
        self.depth + 1 == MAX_DEPTH
    }

    pub(crate) fn is_sharded(&self) -> bool {
        matches!(self.body, Body::Sharded(_))
    }
}

enum Layout {
    Flat,
    Sharded,
}

/// Source of tree identities. Cursors carry the stamp of the tree they
/// were made from and resolve against no other.
static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

fn next_stamp() -> u64 {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub(crate) struct ShardTree<K, V> {
    nodes: SlotMap<NodeId, Node<K, V>>,
    root: NodeId,
    stamp: u64,
}

impl<K, V> ShardTree<K, V> {
    pub(crate) fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::flat(0, None));
        Self {
            nodes,
            root,
            stamp: next_stamp(),
        }
    }

    /// Empty tree whose root starts sharded at `tier` (flat when `tier == 0`).
    pub(crate) fn with_root_tier(tier: usize) -> Self {
        let mut tree = Self::new();
        if tier > 0 {
            let tier = tier.min(TIER_COUNT - 1);
            let root = &mut tree.nodes[tree.root];
            root.tier = tier;
            root.body = Body::Sharded(Shards::new(CAPACITY_TIERS[tier]));
        }
        tree
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    /// Identity of this tree. Changes on `clear`, so cursors taken before
    /// a clear stop resolving.
    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node<K, V>> {
        self.nodes.get(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes[self.root].len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity tier of the root when it is sharded, 0 when it is flat.
    pub(crate) fn root_tier(&self) -> usize {
        let root = &self.nodes[self.root];
        if root.is_sharded() {
            root.tier
        } else {
            0
        }
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = self.nodes.insert(Node::flat(0, None));
        self.stamp = next_stamp();
    }

    /// Node and index of the entry for `q`.
    pub(crate) fn locate<Q>(&self, hash: u64, q: &Q) -> Option<(NodeId, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            match &node.body {
                Body::Flat(entries) => {
                    return entries
                        .iter()
                        .position(|e| e.hash == hash && e.key.borrow() == q)
                        .map(|i| (id, i));
                }
                Body::Sharded(shards) => {
                    id = shards.get(position_of(hash, node.table_size(), node.depth))?;
                }
            }
        }
    }

    pub(crate) fn entry(&self, id: NodeId, index: usize) -> Option<&Entry<K, V>> {
        match &self.nodes.get(id)?.body {
            Body::Flat(entries) => entries.get(index),
            Body::Sharded(_) => None,
        }
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId, index: usize) -> Option<&mut Entry<K, V>> {
        match &mut self.nodes.get_mut(id)?.body {
            Body::Flat(entries) => entries.get_mut(index),
            Body::Sharded(_) => None,
        }
    }

    pub(crate) fn find<Q>(&self, hash: u64, q: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let (id, index) = self.locate(hash, q)?;
        self.entry(id, index)
    }

    pub(crate) fn find_mut<Q>(&mut self, hash: u64, q: &Q) -> Option<&mut Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let (id, index) = self.locate(hash, q)?;
        self.entry_mut(id, index)
    }

    /// Insert a new entry. A duplicate key hands the entry back untouched.
    pub(crate) fn insert(&mut self, entry: Entry<K, V>) -> Result<(), Entry<K, V>>
    where
        K: Eq,
    {
        self.insert_at(self.root, entry, false)
    }

    /// Insert an entry whose key is known to be absent, as when copying
    /// another tree. Keys are not compared.
    pub(crate) fn insert_unique(&mut self, entry: Entry<K, V>)
    where
        K: Eq,
    {
        let res = self.insert_at(self.root, entry, true);
        debug_assert!(res.is_ok());
    }

    /// Insert and report where the new entry ended up after any resizing.
    ///
    /// Equal hashes always route to the same flat list, and resizing as
    /// well as removal keep list order, so the newest entry is the last
    /// one carrying its hash.
    pub(crate) fn insert_tracked(
        &mut self,
        entry: Entry<K, V>,
    ) -> Result<(NodeId, usize), Entry<K, V>>
    where
        K: Eq,
    {
        let hash = entry.hash;
        self.insert(entry)?;
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            match &node.body {
                Body::Flat(entries) => {
                    let index = entries.iter().rposition(|e| e.hash == hash);
                    debug_assert!(index.is_some());
                    return Ok((id, index.unwrap_or(0)));
                }
                Body::Sharded(shards) => {
                    match shards.get(position_of(hash, node.table_size(), node.depth)) {
                        Some(child) => id = child,
                        None => unreachable!("inserted hash has a route"),
                    }
                }
            }
        }
    }

    /// `known_unique` skips the duplicate scan for entries moved during a
    /// rebuild, so resizing never calls `K: Eq`.
    fn insert_at(
        &mut self,
        id: NodeId,
        entry: Entry<K, V>,
        known_unique: bool,
    ) -> Result<(), Entry<K, V>>
    where
        K: Eq,
    {
        let node = &mut self.nodes[id];
        if let Body::Flat(entries) = &mut node.body {
            if !known_unique
                && entries
                    .iter()
                    .any(|e| e.hash == entry.hash && e.key == entry.key)
            {
                return Err(entry);
            }
            entries.push(entry);
            node.len += 1;
            if !node.at_max_depth() && node.len * DENSITY_DIVISOR >= flat_limit() {
                self.expand(id);
            }
            return Ok(());
        }
        let pos = position_of(entry.hash, node.table_size(), node.depth);

        let child = match self.child(id, pos) {
            Some(child) => child,
            None => self.attach_child(id, pos),
        };
        self.insert_at(child, entry, known_unique)?;

        let node = &mut self.nodes[id];
        node.len += 1;
        let occupied = match &node.body {
            Body::Sharded(shards) => shards.occupied,
            Body::Flat(_) => 0,
        };
        if occupied * DENSITY_DIVISOR >= node.table_size() {
            self.expand(id);
        }
        Ok(())
    }

    /// Remove the entry for `q`, returning it.
    pub(crate) fn remove<Q>(&mut self, hash: u64, q: &Q) -> Option<Entry<K, V>>
    where
        K: Borrow<Q> + Eq,
        Q: ?Sized + Eq,
    {
        self.remove_at(self.root, hash, q)
    }

    fn remove_at<Q>(&mut self, id: NodeId, hash: u64, q: &Q) -> Option<Entry<K, V>>
    where
        K: Borrow<Q> + Eq,
        Q: ?Sized + Eq,
    {
        let node = &mut self.nodes[id];
        if let Body::Flat(entries) = &mut node.body {
            let index = entries
                .iter()
                .position(|e| e.hash == hash && e.key.borrow() == q)?;
            let removed = entries.remove(index);
            node.len -= 1;
            return Some(removed);
        }
        let pos = position_of(hash, node.table_size(), node.depth);

        let child = self.child(id, pos)?;
        let removed = self.remove_at(child, hash, q)?;
        self.nodes[id].len -= 1;

        if self.nodes[child].len == 0 {
            self.detach_child(id, pos);
            let node = &self.nodes[id];
            if let Body::Sharded(shards) = &node.body {
                if shards.occupied * DENSITY_DIVISOR * DENSITY_DIVISOR <= node.table_size() {
                    self.reduce(id);
                }
            }
        }
        Some(removed)
    }

    fn child(&self, id: NodeId, slot: usize) -> Option<NodeId> {
        match &self.nodes[id].body {
            Body::Sharded(shards) => shards.get(slot),
            Body::Flat(_) => None,
        }
    }

    fn attach_child(&mut self, parent: NodeId, slot: usize) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        let child = self.nodes.insert(Node::flat(depth, Some(Link { parent, slot })));
        if let Body::Sharded(shards) = &mut self.nodes[parent].body {
            debug_assert!(shards.children[slot].is_none());
            shards.children[slot] = Some(child);
            shards.occupied += 1;
        }
        child
    }

    fn detach_child(&mut self, parent: NodeId, slot: usize) {
        let taken = match &mut self.nodes[parent].body {
            Body::Sharded(shards) => {
                let taken = shards.children[slot].take();
                if taken.is_some() {
                    shards.occupied -= 1;
                }
                taken
            }
            Body::Flat(_) => None,
        };
        if let Some(child) = taken {
            let leftover = self.release_subtree(child);
            debug_assert!(leftover.is_empty());
            self.nodes.remove(child);
        }
    }

    /// Grow `id` to the next capacity tier, turning a flat node sharded.
    fn expand(&mut self, id: NodeId)
    where
        K: Eq,
    {
        let node = &self.nodes[id];
        if node.tier + 1 == TIER_COUNT {
            debug!(depth = node.depth, len = node.len, "expand refused at largest tier");
            return;
        }
        let tier = node.tier + 1;
        trace!(depth = node.depth, tier, len = node.len, "expanding node");
        let entries = self.release_subtree(id);
        self.rebuild(id, tier, Layout::Sharded, entries);
    }

    /// Shrink `id` by one tier, or fold it back to a flat list when it is
    /// small enough.
    fn reduce(&mut self, id: NodeId)
    where
        K: Eq,
    {
        let node = &self.nodes[id];
        if !node.is_sharded() {
            return;
        }
        let fold =
            node.len == 0 || (node.tier <= 1 && node.len * DENSITY_DIVISOR < flat_limit());
        if fold {
            trace!(depth = node.depth, len = node.len, "folding node back to flat");
            let entries = self.release_subtree(id);
            self.rebuild(id, 0, Layout::Flat, entries);
        } else if node.tier > 0 {
            let tier = node.tier - 1;
            trace!(depth = node.depth, tier, len = node.len, "reducing node");
            let entries = self.release_subtree(id);
            self.rebuild(id, tier, Layout::Sharded, entries);
        }
    }

    /// Move every entry of `id`'s subtree out, freeing its descendants and
    /// leaving `id` an empty flat node. Entries come out in cursor order.
    fn release_subtree(&mut self, id: NodeId) -> Vec<Entry<K, V>> {
        let mut out = Vec::with_capacity(self.nodes[id].len);
        for leaf in self.leaf_order_from(id) {
            if let Body::Flat(entries) = &mut self.nodes[leaf].body {
                out.append(entries);
            }
        }
        let node = &mut self.nodes[id];
        node.len = 0;
        let body = mem::replace(&mut node.body, Body::Flat(Vec::new()));
        let mut pending = vec![body];
        while let Some(body) = pending.pop() {
            if let Body::Sharded(shards) = body {
                for child in shards.children.iter().flatten() {
                    if let Some(node) = self.nodes.remove(*child) {
                        pending.push(node.body);
                    }
                }
            }
        }
        out
    }

    fn rebuild(&mut self, id: NodeId, tier: usize, layout: Layout, entries: Vec<Entry<K, V>>)
    where
        K: Eq,
    {
        let node = &mut self.nodes[id];
        node.tier = tier;
        node.len = 0;
        node.body = match layout {
            Layout::Flat => Body::Flat(Vec::with_capacity(entries.len())),
            Layout::Sharded => Body::Sharded(Shards::new(CAPACITY_TIERS[tier])),
        };
        for entry in entries {
            let res = self.insert_at(id, entry, true);
            debug_assert!(res.is_ok());
        }
    }

    /// Flat nodes holding entries, in cursor order.
    pub(crate) fn leaf_order(&self) -> Vec<NodeId> {
        self.leaf_order_from(self.root)
    }

    /// Non-empty flat nodes of the subtree rooted at `id`, walked by a
    /// cursor anchored at `id`'s depth so it never leaves the subtree.
    fn leaf_order_from(&self, id: NodeId) -> Vec<NodeId> {
        let anchor = self.nodes[id].depth;
        let mut leaves = Vec::new();
        let mut cursor = Cursor::begin_at(self, id, anchor);
        while let Some(node) = cursor.node() {
            leaves.push(node);
            cursor = cursor.skip_leaf(self);
        }
        leaves
    }

    /// Mutable views of every non-empty flat list, in cursor order.
    pub(crate) fn leaves_mut(&mut self) -> Vec<&mut [Entry<K, V>]> {
        let order = self.leaf_order();
        let mut rank: SecondaryMap<NodeId, usize> = SecondaryMap::with_capacity(order.len());
        for (i, id) in order.iter().enumerate() {
            rank.insert(*id, i);
        }
        let mut slots: Vec<Option<&mut [Entry<K, V>]>> = (0..order.len()).map(|_| None).collect();
        for (id, node) in self.nodes.iter_mut() {
            if let (Some(&i), Body::Flat(entries)) = (rank.get(id), &mut node.body) {
                slots[i] = Some(entries.as_mut_slice());
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// Take every entry out, leaving an empty tree.
    pub(crate) fn drain_all(&mut self) -> Vec<Entry<K, V>> {
        let entries = self.release_subtree(self.root);
        self.clear();
        entries
    }
}

impl<K, V> Default for ShardTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl<K, V> ShardTree<K, V> {
    /// Check every structural invariant, panicking on the first violation.
    pub(crate) fn check_invariants(&self)
    where
        K: Eq,
    {
        let root = &self.nodes[self.root];
        assert_eq!(root.depth, 0);
        assert!(root.parent.is_none());

        let mut reachable = 0usize;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            reachable += 1;
            let node = &self.nodes[id];
            assert!(node.depth < MAX_DEPTH, "depth bound");
            assert!(node.tier < TIER_COUNT);
            match &node.body {
                Body::Flat(entries) => {
                    assert_eq!(node.len, entries.len(), "flat len");
                    assert_eq!(node.tier, 0, "flat nodes sit at tier 0");
                    if id != self.root {
                        assert!(!entries.is_empty(), "empty leaves are freed");
                    }
                    // Routing by hash lands on exactly this slot, so no
                    // other copy of the key is reachable.
                    for (i, e) in entries.iter().enumerate() {
                        assert_eq!(self.locate(e.hash, &e.key), Some((id, i)));
                    }
                }
                Body::Sharded(shards) => {
                    assert!(!node.at_max_depth(), "max depth stays flat");
                    assert_eq!(shards.children.len(), node.table_size());
                    let present: Vec<_> = shards
                        .children
                        .iter()
                        .enumerate()
                        .filter_map(|(i, c)| c.map(|c| (i, c)))
                        .collect();
                    assert_eq!(shards.occupied, present.len(), "occupied count");
                    let mut sum = 0;
                    for (slot, child) in present {
                        let c = &self.nodes[child];
                        assert_eq!(c.parent, Some(Link { parent: id, slot }));
                        assert_eq!(c.depth, node.depth + 1);
                        assert!(c.len > 0, "empty children are freed");
                        sum += c.len;
                        stack.push(child);
                    }
                    assert_eq!(node.len, sum, "sharded len is the children sum");
                    assert_eq!(self.subtree_traversal_len(id), node.len);
                }
            }
        }
        assert_eq!(reachable, self.nodes.len(), "no orphaned nodes");
    }

    /// Entries visited by a cursor anchored at `id`.
    pub(crate) fn subtree_traversal_len(&self, id: NodeId) -> usize {
        let anchor = self.nodes[id].depth;
        let mut n = 0;
        let mut cursor = Cursor::begin_at(self, id, anchor);
        while !cursor.is_end() {
            n += 1;
            cursor = cursor.advance_in(self);
        }
        n
    }

    pub(crate) fn max_node_depth(&self) -> usize {
        self.nodes.values().map(|n| n.depth).max().unwrap_or(0)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
