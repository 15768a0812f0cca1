//! Headless render target.
//!
//! Mirrors the rendered tree in memory, the way a DOM would, and validates
//! every op against it: inserting a node twice, anchoring on a node that is
//! not a child of the parent, or touching an unknown node are all errors.
//! Useful for tests and for hosts that render from a snapshot.

use std::collections::HashMap;

use crate::error::TargetError;
use crate::types::{ElementType, Key, MutationOp, NodeDescription, NodeId, Props};

use super::commit::RenderTarget;

/// One node as the target sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct HostNode {
    pub ty: ElementType,
    pub key: Key,
    pub props: Props,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// In-memory render target.
#[derive(Debug, Default)]
pub struct HeadlessTarget {
    nodes: HashMap<NodeId, HostNode>,
    /// Children of parents the target never saw inserted (root containers).
    containers: HashMap<NodeId, Vec<NodeId>>,
    applied: usize,
}

impl HeadlessTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ops applied successfully.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Number of mounted nodes (containers excluded).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&HostNode> {
        self.nodes.get(&id)
    }

    /// Children of a mounted node or of a container.
    pub fn children_of(&self, parent: NodeId) -> &[NodeId] {
        if let Some(node) = self.nodes.get(&parent) {
            return &node.children;
        }
        self.containers
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rebuild descriptions for everything mounted under `parent`.
    ///
    /// Positional keys are dropped, so a snapshot compares equal to the
    /// descriptions that were rendered.
    pub fn snapshot(&self, parent: NodeId) -> Vec<NodeDescription> {
        self.children_of(parent)
            .iter()
            .filter_map(|&child| self.describe(child))
            .collect()
    }

    fn describe(&self, id: NodeId) -> Option<NodeDescription> {
        let node = self.nodes.get(&id)?;
        Some(NodeDescription {
            ty: node.ty,
            key: match &node.key {
                Key::Explicit(key) => Some(key.clone()),
                Key::Index(_) => None,
            },
            props: node.props.clone(),
            children: self.snapshot(id),
        })
    }

    fn siblings_mut(&mut self, parent: NodeId) -> &mut Vec<NodeId> {
        match self.nodes.get_mut(&parent) {
            Some(node) => &mut node.children,
            None => self.containers.entry(parent).or_default(),
        }
    }

    fn place(
        &mut self,
        parent: NodeId,
        node: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), TargetError> {
        let siblings = self.siblings_mut(parent);
        let position = match before {
            Some(anchor) => siblings.iter().position(|&c| c == anchor).ok_or_else(|| {
                TargetError::new(format!("anchor {anchor} is not a child of {parent}"))
            })?,
            None => siblings.len(),
        };
        siblings.insert(position, node);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.nodes.get(&node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            self.siblings_mut(parent).retain(|&c| c != node);
        }
    }

    fn drop_subtree(&mut self, node: NodeId) {
        if let Some(removed) = self.nodes.remove(&node) {
            for child in removed.children {
                self.drop_subtree(child);
            }
        }
    }
}

impl RenderTarget for HeadlessTarget {
    fn apply_op(&mut self, op: &MutationOp) -> Result<(), TargetError> {
        match op {
            MutationOp::Insert {
                node,
                parent,
                before,
                ty,
                key,
                props,
            } => {
                if self.nodes.contains_key(node) {
                    return Err(TargetError::new(format!("{node} is already mounted")));
                }
                self.place(*parent, *node, *before)?;
                self.nodes.insert(
                    *node,
                    HostNode {
                        ty: *ty,
                        key: key.clone(),
                        props: props.clone(),
                        parent: Some(*parent),
                        children: Vec::new(),
                    },
                );
            }
            MutationOp::Move {
                node,
                parent,
                before,
            } => {
                if !self.nodes.contains_key(node) {
                    return Err(TargetError::new(format!("cannot move unknown {node}")));
                }
                self.detach(*node);
                self.place(*parent, *node, *before)?;
                if let Some(host) = self.nodes.get_mut(node) {
                    host.parent = Some(*parent);
                }
            }
            MutationOp::Update {
                node, new_props, ..
            } => {
                let host = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| TargetError::new(format!("cannot update unknown {node}")))?;
                host.props = new_props.clone();
            }
            MutationOp::Remove { node } => {
                if !self.nodes.contains_key(node) {
                    return Err(TargetError::new(format!("cannot remove unknown {node}")));
                }
                self.detach(*node);
                self.drop_subtree(*node);
            }
        }
        self.applied += 1;
        Ok(())
    }
}
