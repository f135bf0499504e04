//! Cursor: a position in the tree that walks back out of nested nodes.
//!
//! A cursor names one entry by `(node, index)` plus the depth it was started
//! from (the anchor). Advancing moves along the node's flat list; at the
//! end of the list it climbs parent links, scanning each parent's children
//! to the right of the slot it came from, and descends into the first
//! live child found. Reaching the anchor depth ends the walk.
//!
//! The anchor bounds a walk to one subtree. Public cursors start at depth
//! 0 and cover the whole map; resizing walks a single node's subtree with
//! the anchor set to that node's depth.
//!
//! Cursors hold no borrow of the map. They carry the stamp of the tree they
//! came from, so a cursor applied to another map (or to the same map after
//! `clear`) resolves to `None`. Any structural mutation invalidates them; a
//! cursor whose node was freed resolves to `None` rather than to a node
//! allocated later, since node ids are generational.

use crate::map::RecursiveHashMap;
use crate::shard_tree::{Body, NodeId, ShardTree};

/// Position of one entry inside a [`RecursiveHashMap`], or the end marker.
///
/// Two cursors are equal when they name the same entry slot of the same
/// map with the same anchor; [`Cursor::END`] equals only itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cursor {
    pos: Option<Pos>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct Pos {
    stamp: u64,
    node: NodeId,
    index: usize,
    anchor: usize,
}

impl Cursor {
    /// The end marker.
    pub const END: Cursor = Cursor { pos: None };

    pub(crate) fn at(stamp: u64, node: NodeId, index: usize, anchor: usize) -> Cursor {
        Cursor {
            pos: Some(Pos {
                stamp,
                node,
                index,
                anchor,
            }),
        }
    }

    /// First entry of the subtree rooted at `id`, anchored at `anchor`.
    pub(crate) fn begin_at<K, V>(tree: &ShardTree<K, V>, id: NodeId, anchor: usize) -> Cursor {
        let mut id = id;
        loop {
            let Some(node) = tree.node(id) else {
                return Cursor::END;
            };
            match &node.body {
                Body::Flat(entries) if entries.is_empty() => return Cursor::END,
                Body::Flat(_) => return Cursor::at(tree.stamp(), id, 0, anchor),
                Body::Sharded(_) => match live_child(tree, id, 0) {
                    Some(child) => id = child,
                    None => return Cursor::END,
                },
            }
        }
    }

    /// Next entry in traversal order.
    pub(crate) fn advance_in<K, V>(self, tree: &ShardTree<K, V>) -> Cursor {
        let Some(Pos {
            stamp,
            node,
            index,
            anchor,
        }) = self.pos.filter(|p| p.stamp == tree.stamp())
        else {
            return Cursor::END;
        };
        match tree.node(node).map(|n| &n.body) {
            Some(Body::Flat(entries)) if index + 1 < entries.len() => {
                Cursor::at(stamp, node, index + 1, anchor)
            }
            Some(_) => climb(tree, node, anchor),
            None => Cursor::END,
        }
    }

    /// First entry of the next flat list, skipping what is left of this one.
    pub(crate) fn skip_leaf<K, V>(self, tree: &ShardTree<K, V>) -> Cursor {
        match self.pos.filter(|p| p.stamp == tree.stamp()) {
            Some(pos) => climb(tree, pos.node, pos.anchor),
            None => Cursor::END,
        }
    }

    pub(crate) fn node(&self) -> Option<NodeId> {
        self.pos.map(|p| p.node)
    }

    /// `(node, index)` when the cursor belongs to `tree`.
    pub(crate) fn slot_in<K, V>(&self, tree: &ShardTree<K, V>) -> Option<(NodeId, usize)> {
        self.pos
            .filter(|p| p.stamp == tree.stamp())
            .map(|p| (p.node, p.index))
    }

    /// True for the end marker.
    pub fn is_end(&self) -> bool {
        self.pos.is_none()
    }

    /// Depth the traversal was started from; `None` for the end marker.
    pub fn anchor(&self) -> Option<usize> {
        self.pos.map(|p| p.anchor)
    }

    /// Step to the next entry of `map`.
    pub fn advance<K, V, S>(self, map: &RecursiveHashMap<K, V, S>) -> Cursor {
        self.advance_in(map.tree())
    }

    pub fn key<'a, K, V, S>(&self, map: &'a RecursiveHashMap<K, V, S>) -> Option<&'a K> {
        self.entry(map).map(|(k, _)| k)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a RecursiveHashMap<K, V, S>) -> Option<&'a V> {
        self.entry(map).map(|(_, v)| v)
    }

    pub fn entry<'a, K, V, S>(&self, map: &'a RecursiveHashMap<K, V, S>) -> Option<(&'a K, &'a V)> {
        let (node, index) = self.slot_in(map.tree())?;
        map.tree().entry(node, index).map(|e| (&e.key, &e.value))
    }

    pub fn value_mut<'a, K, V, S>(
        &self,
        map: &'a mut RecursiveHashMap<K, V, S>,
    ) -> Option<&'a mut V> {
        let (node, index) = self.slot_in(map.tree())?;
        map.tree_mut().entry_mut(node, index).map(|e| &mut e.value)
    }
}

/// First child of `id` at a slot `>= from` holding at least one entry.
fn live_child<K, V>(tree: &ShardTree<K, V>, id: NodeId, from: usize) -> Option<NodeId> {
    let Body::Sharded(shards) = &tree.node(id)?.body else {
        return None;
    };
    let mut from = from;
    while let Some((slot, child)) = shards.next_present(from) {
        if tree.node(child).is_some_and(|c| c.len > 0) {
            return Some(child);
        }
        from = slot + 1;
    }
    None
}

/// Climb from `id` towards the anchor, descending into the first live
/// sibling to the right of each slot passed on the way up.
fn climb<K, V>(tree: &ShardTree<K, V>, id: NodeId, anchor: usize) -> Cursor {
    let mut id = id;
    loop {
        let Some(node) = tree.node(id) else {
            return Cursor::END;
        };
        if node.depth <= anchor {
            return Cursor::END;
        }
        let Some(link) = node.parent else {
            return Cursor::END;
        };
        if let Some(next) = live_child(tree, link.parent, link.slot + 1) {
            return Cursor::begin_at(tree, next, anchor);
        }
        id = link.parent;
    }
}
