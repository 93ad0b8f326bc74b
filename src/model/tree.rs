//! Generic ordered n-ary tree over a slotmap arena.
//!
//! Nodes reference parent and children by [`NodeId`]; nothing in here owns a
//! pointer. Structural operations only: callers that need a validity
//! predicate (the tiling layout) must check it before mutating, since
//! mutations are not transactional.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

new_key_type! { pub struct NodeId; }

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node<T> {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest<T> {
    nodes: SlotMap<NodeId, Node<T>>,
}

impl<T> Default for Forest<T> {
    fn default() -> Self { Self { nodes: SlotMap::default() } }
}

impl<T> Forest<T> {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn node_count(&self) -> usize { self.nodes.len() }

    pub fn contains(&self, node: NodeId) -> bool { self.nodes.contains_key(node) }

    /// Allocate a detached node. It is not reachable from any root until
    /// attached with [`Forest::insert`].
    pub fn alloc(&mut self, data: T) -> NodeId {
        self.nodes.insert(Node {
            parent: None,
            children: Vec::new(),
            data,
        })
    }

    pub fn get(&self, node: NodeId) -> Option<&T> { self.nodes.get(node).map(|n| &n.data) }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(node).map(|n| &mut n.data)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Count of direct children.
    pub fn len(&self, node: NodeId) -> usize {
        self.nodes.get(node).map(|n| n.children.len()).unwrap_or(0)
    }

    pub fn ith_child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    /// Position of `node` within its parent's child list.
    pub fn child_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    /// Attach a detached node as the `index`-th child of `parent`. Fails
    /// without mutation if the node is already attached, the index is out of
    /// range, or parent and node are the same.
    pub fn insert(&mut self, parent: NodeId, node: NodeId, index: usize) -> bool {
        if node == parent || !self.nodes.contains_key(parent) {
            return false;
        }
        match self.nodes.get(node) {
            Some(n) if n.parent.is_none() => {}
            _ => return false,
        }
        let siblings = &mut self.nodes[parent].children;
        if index > siblings.len() {
            return false;
        }
        siblings.insert(index, node);
        self.nodes[node].parent = Some(parent);
        true
    }

    /// Detach `node` from its parent's child list, keeping it in the arena.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.nodes[parent].children.retain(|&c| c != node);
        self.nodes[node].parent = None;
    }

    /// Detach and free a single node. The node must have no children; a node
    /// with children would leave them unreachable.
    pub fn remove(&mut self, node: NodeId) -> Option<T> {
        debug_assert!(self.len(node) == 0, "remove() on a node that still has children");
        self.detach(node);
        self.nodes.remove(node).map(|n| n.data)
    }

    /// Free `node` and every descendant.
    pub fn remove_subtree(&mut self, node: NodeId) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        let children = n.children.clone();
        for child in children {
            self.remove_subtree(child);
        }
        self.detach(node);
        self.nodes.remove(node);
    }

    /// Swap `node` with its next (`forward`) or previous sibling in traversal
    /// order. Returns false at the ends of the child list.
    pub fn shift(&mut self, node: NodeId, forward: bool) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        let Some(pos) = self.child_index(node) else {
            return false;
        };
        let siblings = &mut self.nodes[parent].children;
        if forward {
            if pos + 1 >= siblings.len() {
                return false;
            }
            siblings.swap(pos, pos + 1);
        } else {
            if pos == 0 {
                return false;
            }
            siblings.swap(pos, pos - 1);
        }
        true
    }

    /// Linear preorder search below (and including) `root`.
    pub fn find(&self, root: NodeId, predicate: &impl Fn(&T) -> bool) -> Option<NodeId> {
        let n = self.nodes.get(root)?;
        if predicate(&n.data) {
            return Some(root);
        }
        for &child in &n.children {
            if let Some(found) = self.find(child, predicate) {
                return Some(found);
            }
        }
        None
    }

    /// Depth of `node` below its root: a root has depth 0.
    pub fn depth(&self, node: NodeId) -> usize { self.ancestors(node).count() }

    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_, T> {
        Ancestors {
            forest: self,
            current: self.parent(node),
        }
    }

    /// Walks up to the root of the tree containing `node`.
    pub fn root_of(&self, node: NodeId) -> NodeId {
        self.ancestors(node).last().unwrap_or(node)
    }

    pub fn preorder(&self, root: NodeId, out: &mut Vec<NodeId>) {
        if let Some(n) = self.nodes.get(root) {
            out.push(root);
            for &child in &n.children {
                self.preorder(child, out);
            }
        }
    }
}

impl<T> std::ops::Index<NodeId> for Forest<T> {
    type Output = T;

    fn index(&self, node: NodeId) -> &T { &self.nodes[node].data }
}

impl<T> std::ops::IndexMut<NodeId> for Forest<T> {
    fn index_mut(&mut self, node: NodeId) -> &mut T { &mut self.nodes[node].data }
}

pub struct Ancestors<'a, T> {
    forest: &'a Forest<T>,
    current: Option<NodeId>,
}

impl<T> Iterator for Ancestors<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.current?;
        self.current = self.forest.parent(node);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Forest<&'static str>, NodeId, NodeId, NodeId, NodeId) {
        let mut forest = Forest::new();
        let root = forest.alloc("root");
        let a = forest.alloc("a");
        let b = forest.alloc("b");
        let c = forest.alloc("c");
        assert!(forest.insert(root, a, 0));
        assert!(forest.insert(root, b, 1));
        assert!(forest.insert(a, c, 0));
        (forest, root, a, b, c)
    }

    #[test]
    fn insert_orders_children() {
        let (mut forest, root, a, b, _) = sample();
        let front = forest.alloc("front");
        assert!(forest.insert(root, front, 0));
        assert_eq!(forest.children(root), &[front, a, b]);
        assert_eq!(forest.child_index(b), Some(2));
    }

    #[test]
    fn insert_rejects_attached_node() {
        let (mut forest, root, a, _, _) = sample();
        assert!(!forest.insert(root, a, 0));
        assert_eq!(forest.len(root), 2);
    }

    #[test]
    fn insert_rejects_out_of_range_index() {
        let (mut forest, root, ..) = sample();
        let n = forest.alloc("n");
        assert!(!forest.insert(root, n, 5));
        assert!(forest.parent(n).is_none());
    }

    #[test]
    fn remove_detaches_leaf() {
        let (mut forest, _, a, _, c) = sample();
        assert_eq!(forest.remove(c), Some("c"));
        assert_eq!(forest.len(a), 0);
        assert!(!forest.contains(c));
    }

    #[test]
    fn remove_subtree_frees_descendants() {
        let (mut forest, root, a, b, c) = sample();
        forest.remove_subtree(root);
        for node in [root, a, b, c] {
            assert!(!forest.contains(node));
        }
        assert!(forest.is_empty());
    }

    #[test]
    fn shift_swaps_siblings() {
        let (mut forest, root, a, b, _) = sample();
        assert!(forest.shift(a, true));
        assert_eq!(forest.children(root), &[b, a]);
        assert!(!forest.shift(a, true));
        assert!(forest.shift(a, false));
        assert_eq!(forest.children(root), &[a, b]);
    }

    #[test]
    fn find_runs_preorder() {
        let (forest, root, _, _, c) = sample();
        assert_eq!(forest.find(root, &|d| *d == "c"), Some(c));
        assert_eq!(forest.find(root, &|d| *d == "nope"), None);
    }

    #[test]
    fn depth_and_ancestors() {
        let (forest, root, a, _, c) = sample();
        assert_eq!(forest.depth(root), 0);
        assert_eq!(forest.depth(c), 2);
        let chain: Vec<_> = forest.ancestors(c).collect();
        assert_eq!(chain, vec![a, root]);
        assert_eq!(forest.root_of(c), root);
    }
}
