//! Node Store - Arena of tree nodes.
//!
//! Manages the lifecycle of node slots:
//! - Generational ids so released slots can be reused safely
//! - Free slot pool for O(1) reuse
//! - Parent/children links by id instead of references
//!
//! Nodes allocated by an in-flight render pass carry [`NodeFlags::STAGED`]
//! and stay detached until their `Insert` op is committed, so discarding a
//! pass is just releasing its staged ids.

use tracing::trace;

use crate::types::{ElementType, Key, MutationOp, NodeDescription, NodeFlags, NodeId, Props};

// =============================================================================
// Node
// =============================================================================

/// One position in a rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub key: Key,
    pub ty: ElementType,
    pub props: Props,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub flags: NodeFlags,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

// =============================================================================
// Store
// =============================================================================

/// Arena owning every node of every root.
#[derive(Default)]
pub struct NodeStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    allocated: usize,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Allocate a detached node.
    pub fn allocate(&mut self, key: Key, ty: ElementType, props: Props, flags: NodeFlags) -> NodeId {
        // Reuse free slot or grow
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = NodeId {
            index,
            generation: slot.generation,
        };
        slot.node = Some(Node {
            id,
            key,
            ty,
            props,
            parent: None,
            children: Vec::new(),
            flags,
        });
        self.allocated += 1;

        id
    }

    /// Allocate the host container for a render root.
    pub fn allocate_root(&mut self) -> NodeId {
        self.allocate(Key::Index(0), ElementType::Root, Props::new(), NodeFlags::ROOT)
    }

    /// Release a node and its whole subtree.
    ///
    /// Detaches it from its parent and returns the slots to the pool,
    /// children first. Stale ids are ignored.
    pub fn release(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }

        if let Some(parent) = self.parent(id) {
            if let Some(parent_node) = self.get_mut(parent) {
                parent_node.children.retain(|&child| child != id);
            }
        }

        self.release_detached(id);
    }

    fn release_detached(&mut self, id: NodeId) {
        let children = match self.get(id) {
            Some(node) => node.children.clone(),
            None => return,
        };

        for child in children {
            self.release_detached(child);
        }

        let slot = &mut self.slots[id.index()];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.allocated -= 1;

        trace!(node = %id, "released node");
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Resolve an id, `None` if it is stale or was never allocated.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Check if an id currently resolves to a node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Children of a node in order (empty for unknown ids).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    /// Sibling immediately after `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let position = siblings.iter().position(|&s| s == id)?;
        siblings.get(position + 1).copied()
    }

    /// Sibling immediately before `id`.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let position = siblings.iter().position(|&s| s == id)?;
        position.checked_sub(1).map(|p| siblings[p])
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Rebuild a description of the committed subtree under `id`.
    ///
    /// Positional keys are dropped, so the result compares equal to the
    /// description that produced the subtree.
    pub fn describe(&self, id: NodeId) -> Option<NodeDescription> {
        let node = self.get(id)?;
        Some(NodeDescription {
            ty: node.ty,
            key: match &node.key {
                Key::Explicit(key) => Some(key.clone()),
                Key::Index(_) => None,
            },
            props: node.props.clone(),
            children: node
                .children
                .iter()
                .filter_map(|&child| self.describe(child))
                .collect(),
        })
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Attach `child` under `parent`, before `before` or at the end.
    ///
    /// A child that is already attached somewhere is detached first, which
    /// makes this the move operation too. An unknown `before` appends.
    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }

        if let Some(old_parent) = self.parent(child) {
            if let Some(node) = self.get_mut(old_parent) {
                node.children.retain(|&c| c != child);
            }
        }

        if let Some(node) = self.get_mut(parent) {
            let position = before
                .and_then(|b| node.children.iter().position(|&c| c == b))
                .unwrap_or(node.children.len());
            node.children.insert(position, child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Replace a node's props.
    pub fn set_props(&mut self, id: NodeId, props: Props) {
        if let Some(node) = self.get_mut(id) {
            node.props = props;
        }
    }

    pub fn insert_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(node) = self.get_mut(id) {
            node.flags.insert(flags);
        }
    }

    pub fn remove_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(node) = self.get_mut(id) {
            node.flags.remove(flags);
        }
    }

    /// Apply one committed op to the in-memory tree.
    pub fn apply(&mut self, op: &MutationOp) {
        match op {
            MutationOp::Insert {
                node,
                parent,
                before,
                ..
            } => {
                self.insert_child(*parent, *node, *before);
                self.remove_flags(*node, NodeFlags::STAGED | NodeFlags::NEEDS_COMMIT);
            }
            MutationOp::Move {
                node,
                parent,
                before,
            } => {
                self.insert_child(*parent, *node, *before);
                self.remove_flags(*node, NodeFlags::NEEDS_COMMIT);
            }
            MutationOp::Update {
                node, new_props, ..
            } => {
                self.set_props(*node, new_props.clone());
                self.remove_flags(*node, NodeFlags::NEEDS_COMMIT);
            }
            MutationOp::Remove { node } => self.release(*node),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(store: &mut NodeStore, key: &str) -> NodeId {
        store.allocate(
            Key::Explicit(key.into()),
            ElementType::Text,
            Props::new(),
            NodeFlags::NONE,
        )
    }

    #[test]
    fn test_allocate() {
        let mut store = NodeStore::new();

        let root = store.allocate_root();
        let a = leaf(&mut store, "a");

        assert_eq!(root.index(), 0);
        assert_eq!(a.index(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get(root).unwrap().flags.contains(NodeFlags::ROOT));
    }

    #[test]
    fn test_release_and_reuse() {
        let mut store = NodeStore::new();

        let a = leaf(&mut store, "a");
        let b = leaf(&mut store, "b");

        store.release(a);
        assert!(!store.contains(a));
        assert!(store.contains(b));

        // Slot is reused with a new generation
        let c = leaf(&mut store, "c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(!store.contains(a));
        assert_eq!(store.get(c).unwrap().key, Key::Explicit("c".into()));
    }

    #[test]
    fn test_insert_and_siblings() {
        let mut store = NodeStore::new();
        let root = store.allocate_root();
        let a = leaf(&mut store, "a");
        let b = leaf(&mut store, "b");
        let c = leaf(&mut store, "c");

        store.insert_child(root, a, None);
        store.insert_child(root, c, None);
        store.insert_child(root, b, Some(c));

        assert_eq!(store.children(root), &[a, b, c]);
        assert_eq!(store.next_sibling(a), Some(b));
        assert_eq!(store.prev_sibling(a), None);
        assert_eq!(store.prev_sibling(c), Some(b));
        assert_eq!(store.parent(b), Some(root));
    }

    #[test]
    fn test_insert_child_moves_existing() {
        let mut store = NodeStore::new();
        let root = store.allocate_root();
        let a = leaf(&mut store, "a");
        let b = leaf(&mut store, "b");
        let c = leaf(&mut store, "c");
        for n in [a, b, c] {
            store.insert_child(root, n, None);
        }

        store.insert_child(root, c, Some(a));
        assert_eq!(store.children(root), &[c, a, b]);
    }

    #[test]
    fn test_release_subtree() {
        let mut store = NodeStore::new();
        let root = store.allocate_root();
        let a = leaf(&mut store, "a");
        let inner = leaf(&mut store, "inner");
        store.insert_child(root, a, None);
        store.insert_child(a, inner, None);

        store.release(a);

        assert!(!store.contains(a));
        assert!(!store.contains(inner));
        assert!(store.children(root).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_describe_drops_positional_keys() {
        let mut store = NodeStore::new();
        let root = store.allocate_root();
        let unkeyed = store.allocate(Key::Index(0), ElementType::Box, Props::new(), NodeFlags::NONE);
        store.insert_child(root, unkeyed, None);

        let description = store.describe(unkeyed).unwrap();
        assert_eq!(description.key, None);
        assert_eq!(description.ty, ElementType::Box);
    }
}
