//! Keyed child-list reconciliation.
//!
//! Compares the committed children of one parent with the new descriptions
//! for that position and emits the ops that turn one into the other.
//!
//! # Algorithm
//!
//! 1. Reject duplicate explicit keys before anything is emitted
//! 2. Map old children by identity (explicit key, else sibling index)
//! 3. Walk the new descriptions in order and match by identity:
//!    - no match: stage a node, emit `Insert`
//!    - same type: emit `Update` if props differ, `Move` if not stable
//!    - other type: emit `Remove` for the old node and `Insert` for a new one
//! 4. Stable nodes are the longest run of matches whose old indices increase
//!    in new order; they never move and anchor every placement
//! 5. Unmatched old children are removed last, in their original order
//!
//! Single pass over each list plus an O(n log n) stable-set computation.
//! No tree-edit distance: a type change discards the whole subtree.

use std::collections::{HashMap, HashSet};

use crate::engine::NodeStore;
use crate::error::ReconcileError;
use crate::types::{Key, MutationOp, NodeDescription, NodeFlags, NodeId};

// =============================================================================
// Staging
// =============================================================================

/// Store entries an in-flight pass has created or marked.
///
/// Nothing here is visible until commit; discarding releases the staged
/// slots and clears the marks on committed nodes.
#[derive(Debug, Default)]
pub struct Staging {
    staged: Vec<NodeId>,
    touched: Vec<NodeId>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a detached, staged node for `description` at `position`.
    pub fn stage(
        &mut self,
        store: &mut NodeStore,
        description: &NodeDescription,
        position: usize,
    ) -> NodeId {
        let id = store.allocate(
            description.identity(position),
            description.ty,
            description.props.clone(),
            NodeFlags::STAGED | NodeFlags::NEEDS_COMMIT,
        );
        self.staged.push(id);
        id
    }

    /// Mark a committed node as changed by this pass.
    pub fn touch(&mut self, store: &mut NodeStore, id: NodeId) {
        store.insert_flags(id, NodeFlags::NEEDS_COMMIT);
        self.touched.push(id);
    }

    /// Number of nodes staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Throw away everything this pass staged.
    pub fn discard(self, store: &mut NodeStore) {
        for id in self.touched {
            store.remove_flags(id, NodeFlags::NEEDS_COMMIT);
        }
        // Staged nodes are detached, so releasing one never reaches another
        for id in self.staged {
            store.release(id);
        }
    }
}

// =============================================================================
// Level Reconciliation
// =============================================================================

/// Result of reconciling one parent's children.
#[derive(Debug, Default)]
pub struct LevelResult {
    /// Children of the parent after the ops are applied, in order.
    pub children: Vec<NodeId>,
    /// Ops for this level only.
    pub ops: Vec<MutationOp>,
    /// Nodes whose own children still need reconciling, with the index of
    /// their description in `new_descriptions`.
    pub descend: Vec<(NodeId, usize)>,
}

enum Slot {
    /// Same identity and type as old child `old`.
    Matched { old: usize },
    /// Same identity, different type.
    Replaced { old: usize },
    /// No old child with this identity.
    Fresh,
}

/// Reconcile `old_children` of `parent` against `new_descriptions`.
///
/// `old_children` must be the committed children of `parent` (empty for a
/// staged parent). New nodes are allocated through `staging`.
pub fn reconcile_children(
    store: &mut NodeStore,
    parent: NodeId,
    old_children: &[NodeId],
    new_descriptions: &[NodeDescription],
    staging: &mut Staging,
) -> Result<LevelResult, ReconcileError> {
    check_duplicate_keys(parent, new_descriptions)?;

    // Identity map of the old list
    let old_by_key: HashMap<Key, usize> = old_children
        .iter()
        .enumerate()
        .filter_map(|(position, &id)| {
            let node = store.get(id)?;
            let key = match &node.key {
                Key::Explicit(key) => Key::Explicit(key.clone()),
                Key::Index(_) => Key::Index(position),
            };
            Some((key, position))
        })
        .collect();

    // Match pass
    let mut used = vec![false; old_children.len()];
    let slots: Vec<Slot> = new_descriptions
        .iter()
        .enumerate()
        .map(|(position, description)| {
            let Some(&old) = old_by_key.get(&description.identity(position)) else {
                return Slot::Fresh;
            };
            used[old] = true;
            match store.get(old_children[old]) {
                Some(node) if node.ty == description.ty => Slot::Matched { old },
                _ => Slot::Replaced { old },
            }
        })
        .collect();

    let stable = stable_positions(&slots);
    let anchors = anchors(&slots, &stable, old_children);

    let mut result = LevelResult {
        children: Vec::with_capacity(new_descriptions.len()),
        ops: Vec::new(),
        descend: Vec::new(),
    };

    for (position, (slot, description)) in slots.iter().zip(new_descriptions).enumerate() {
        let before = anchors[position];
        match *slot {
            Slot::Matched { old } => {
                let id = old_children[old];
                let old_props = store
                    .get(id)
                    .map(|node| node.props.clone())
                    .unwrap_or_default();

                if old_props != description.props {
                    result.ops.push(MutationOp::Update {
                        node: id,
                        old_props,
                        new_props: description.props.clone(),
                    });
                    staging.touch(store, id);
                }
                if !stable[position] {
                    result.ops.push(MutationOp::Move {
                        node: id,
                        parent,
                        before,
                    });
                    staging.touch(store, id);
                }

                result.children.push(id);
                result.descend.push((id, position));
            }
            Slot::Replaced { old } => {
                result.ops.push(MutationOp::Remove {
                    node: old_children[old],
                });
                let id = insert(store, staging, &mut result, parent, before, description, position);
                result.descend.push((id, position));
            }
            Slot::Fresh => {
                let id = insert(store, staging, &mut result, parent, before, description, position);
                result.descend.push((id, position));
            }
        }
    }

    // Removals last, original relative order
    for (old, id) in old_children.iter().enumerate() {
        if !used[old] {
            result.ops.push(MutationOp::Remove { node: *id });
        }
    }

    Ok(result)
}

fn insert(
    store: &mut NodeStore,
    staging: &mut Staging,
    result: &mut LevelResult,
    parent: NodeId,
    before: Option<NodeId>,
    description: &NodeDescription,
    position: usize,
) -> NodeId {
    let id = staging.stage(store, description, position);
    result.ops.push(MutationOp::Insert {
        node: id,
        parent,
        before,
        ty: description.ty,
        key: description.identity(position),
        props: description.props.clone(),
    });
    result.children.push(id);
    id
}

fn check_duplicate_keys(
    parent: NodeId,
    descriptions: &[NodeDescription],
) -> Result<(), ReconcileError> {
    let mut seen = HashSet::with_capacity(descriptions.len());
    for key in descriptions.iter().filter_map(|d| d.key.as_deref()) {
        if !seen.insert(key) {
            return Err(ReconcileError::DuplicateKey {
                parent,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Stable Set
// =============================================================================

/// Positions (in new order) of matched nodes that keep their place.
///
/// This is the `lastPlacedOldIndex` walk restricted to the longest
/// increasing subsequence of old indices, so the number of moves is the
/// minimum for the match.
fn stable_positions(slots: &[Slot]) -> Vec<bool> {
    let matched: Vec<(usize, usize)> = slots
        .iter()
        .enumerate()
        .filter_map(|(position, slot)| match slot {
            Slot::Matched { old } => Some((position, *old)),
            _ => None,
        })
        .collect();

    let mut stable = vec![false; slots.len()];
    let old_indices: Vec<usize> = matched.iter().map(|&(_, old)| old).collect();
    for i in longest_increasing_subsequence(&old_indices) {
        stable[matched[i].0] = true;
    }
    stable
}

/// For each position, the next stable node to the right (placement anchor).
fn anchors(slots: &[Slot], stable: &[bool], old_children: &[NodeId]) -> Vec<Option<NodeId>> {
    let mut anchors = vec![None; slots.len()];
    let mut next = None;
    for position in (0..slots.len()).rev() {
        anchors[position] = next;
        if let (true, Slot::Matched { old }) = (stable[position], &slots[position]) {
            next = Some(old_children[*old]);
        }
    }
    anchors
}

/// Indices into `values` of one longest strictly increasing subsequence.
///
/// Patience sorting with predecessor links; ties resolve to the run that
/// ends on the smallest tail.
pub(crate) fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    // tails[k] = index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&t| values[t] < value);
        if slot > 0 {
            predecessor[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = predecessor[i];
    }
    out.reverse();
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{element, text};
    use crate::types::{ElementType, Props};

    struct Fixture {
        store: NodeStore,
        parent: NodeId,
    }

    /// Commit `descriptions` as the children of a fresh root.
    fn committed(descriptions: &[NodeDescription]) -> Fixture {
        let mut store = NodeStore::new();
        let parent = store.allocate_root();
        let mut staging = Staging::new();
        let result =
            reconcile_children(&mut store, parent, &[], descriptions, &mut staging).unwrap();
        for op in &result.ops {
            store.apply(op);
        }
        Fixture { store, parent }
    }

    fn keyed(keys: &[&str]) -> Vec<NodeDescription> {
        keys.iter().map(|k| text(*k).key(*k)).collect()
    }

    fn diff(fixture: &mut Fixture, next: &[NodeDescription]) -> LevelResult {
        let old = fixture.store.children(fixture.parent).to_vec();
        let mut staging = Staging::new();
        reconcile_children(&mut fixture.store, fixture.parent, &old, next, &mut staging).unwrap()
    }

    fn key_of(store: &NodeStore, id: NodeId) -> String {
        match &store.get(id).unwrap().key {
            Key::Explicit(key) => key.clone(),
            Key::Index(i) => format!("#{i}"),
        }
    }

    #[test]
    fn test_initial_render_inserts_everything() {
        let mut store = NodeStore::new();
        let parent = store.allocate_root();
        let mut staging = Staging::new();

        let result =
            reconcile_children(&mut store, parent, &[], &keyed(&["a", "b"]), &mut staging).unwrap();

        assert_eq!(result.ops.len(), 2);
        assert!(result.ops.iter().all(MutationOp::is_insert));
        assert_eq!(staging.staged_len(), 2);
        assert_eq!(result.descend.len(), 2);
    }

    #[test]
    fn test_rotate_right_is_one_move() {
        let mut fixture = committed(&keyed(&["a", "b", "c"]));
        let old = fixture.store.children(fixture.parent).to_vec();

        let result = diff(&mut fixture, &keyed(&["c", "a", "b"]));

        assert_eq!(
            result.ops,
            vec![MutationOp::Move {
                node: old[2],
                parent: fixture.parent,
                before: Some(old[0]),
            }]
        );
        assert_eq!(result.children, vec![old[2], old[0], old[1]]);
    }

    #[test]
    fn test_reverse_is_two_moves() {
        let mut fixture = committed(&keyed(&["a", "b", "c"]));

        let result = diff(&mut fixture, &keyed(&["c", "b", "a"]));

        assert_eq!(result.ops.iter().filter(|op| op.is_move()).count(), 2);
        assert_eq!(result.ops.len(), 2);

        for op in &result.ops {
            fixture.store.apply(op);
        }
        let order: Vec<String> = fixture
            .store
            .children(fixture.parent)
            .iter()
            .map(|&id| key_of(&fixture.store, id))
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_unkeyed_prepend_cascades() {
        let items: Vec<NodeDescription> = (0..4).map(|i| text(format!("item {i}"))).collect();
        let mut fixture = committed(&items);

        let mut next = vec![text("new")];
        next.extend(items.iter().cloned());
        let result = diff(&mut fixture, &next);

        assert_eq!(result.ops.iter().filter(|op| op.is_update()).count(), 4);
        assert_eq!(result.ops.iter().filter(|op| op.is_insert()).count(), 1);
        assert_eq!(result.ops.len(), 5);
    }

    #[test]
    fn test_keyed_prepend_is_one_insert() {
        let mut fixture = committed(&keyed(&["a", "b", "c"]));
        let old = fixture.store.children(fixture.parent).to_vec();

        let result = diff(&mut fixture, &keyed(&["z", "a", "b", "c"]));

        assert_eq!(result.ops.len(), 1);
        match &result.ops[0] {
            MutationOp::Insert { before, .. } => assert_eq!(*before, Some(old[0])),
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn test_type_change_replaces() {
        let mut fixture = committed(&[text("a").key("a")]);
        let old = fixture.store.children(fixture.parent).to_vec();

        let result = diff(&mut fixture, &[element(ElementType::Box).key("a")]);

        assert_eq!(result.ops.len(), 2);
        assert_eq!(result.ops[0], MutationOp::Remove { node: old[0] });
        assert!(result.ops[1].is_insert());
        assert_ne!(result.children[0], old[0]);
    }

    #[test]
    fn test_removals_come_last_in_original_order() {
        let mut fixture = committed(&keyed(&["a", "b", "c", "d"]));
        let old = fixture.store.children(fixture.parent).to_vec();

        let result = diff(&mut fixture, &keyed(&["c", "e"]));

        let removed: Vec<NodeId> = result
            .ops
            .iter()
            .filter_map(|op| match op {
                MutationOp::Remove { node } => Some(*node),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![old[0], old[1], old[3]]);
        assert!(result.ops.last().unwrap().is_remove());
        assert!(result.ops[0].is_insert());
    }

    #[test]
    fn test_props_change_updates_in_place() {
        let mut fixture = committed(&[text("hello").key("a")]);
        let old = fixture.store.children(fixture.parent).to_vec();

        let result = diff(&mut fixture, &[text("world").key("a")]);

        assert_eq!(result.ops.len(), 1);
        match &result.ops[0] {
            MutationOp::Update {
                node,
                old_props,
                new_props,
            } => {
                assert_eq!(*node, old[0]);
                assert_ne!(old_props, new_props);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_identical_lists_emit_nothing() {
        let mut fixture = committed(&keyed(&["a", "b"]));
        let result = diff(&mut fixture, &keyed(&["a", "b"]));
        assert!(result.ops.is_empty());
        assert_eq!(result.descend.len(), 2);
    }

    #[test]
    fn test_duplicate_keys_fail_fast() {
        let mut store = NodeStore::new();
        let parent = store.allocate_root();
        let mut staging = Staging::new();

        let err = reconcile_children(&mut store, parent, &[], &keyed(&["a", "b", "a"]), &mut staging)
            .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::DuplicateKey {
                parent,
                key: "a".into()
            }
        );
        assert_eq!(staging.staged_len(), 0);
    }

    #[test]
    fn test_discard_releases_staged() {
        let mut fixture = committed(&keyed(&["a"]));
        let before = fixture.store.len();
        let old = fixture.store.children(fixture.parent).to_vec();

        let mut staging = Staging::new();
        reconcile_children(
            &mut fixture.store,
            fixture.parent,
            &old,
            &[text("changed").key("a"), text("b").key("b")],
            &mut staging,
        )
        .unwrap();
        assert_eq!(fixture.store.len(), before + 1);
        assert!(fixture.store.get(old[0]).unwrap().flags.contains(NodeFlags::NEEDS_COMMIT));

        staging.discard(&mut fixture.store);

        assert_eq!(fixture.store.len(), before);
        let node = fixture.store.get(old[0]).unwrap();
        assert!(!node.flags.contains(NodeFlags::NEEDS_COMMIT));
        assert_eq!(node.props, {
            let mut props = Props::new();
            props.insert("content".into(), "a".into());
            props
        });
    }

    #[test]
    fn test_lis() {
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[2, 0, 1]), vec![1, 2]);
        assert_eq!(longest_increasing_subsequence(&[2, 1, 0]).len(), 1);
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2, 3]), vec![0, 1, 2, 3]);
        assert_eq!(
            longest_increasing_subsequence(&[3, 0, 4, 1, 2]),
            vec![1, 3, 4]
        );
    }
}
