//! Resumable render pass.
//!
//! A pass reconciles one root's committed tree against a payload in units of
//! work (one unit = one parent's child list). Its cursor is an explicit stack
//! of frames, one per tree level, each holding the matched children still to
//! visit. The scheduler can stop after any unit, hand control back to the
//! host, and pick up later where it left off.
//!
//! ```text
//! step → reconcile container children vs [payload]   → push frame [app]
//! step → reconcile app children vs payload.children  → push frame [title, list]
//! step → reconcile title children                    → push frame []
//! ...yield...
//! step → every frame exhausted → Complete
//! ```
//!
//! Nothing a pass does is visible until its ops are committed. An abandoned
//! pass releases its staged nodes through [`RenderPass::discard`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use super::diff::{reconcile_children, Staging};
use crate::engine::NodeStore;
use crate::error::ReconcileError;
use crate::types::{MutationOp, NodeDescription, NodeId, Payload, RootId};

// =============================================================================
// Work Units
// =============================================================================

/// Matched children of one reconciled parent, visited in order.
#[derive(Debug, Clone)]
struct Frame {
    /// `(node, index)` pairs; `index` points into the description list the
    /// parent was reconciled against.
    descend: Vec<(NodeId, usize)>,
    next: usize,
}

impl Frame {
    fn is_exhausted(&self) -> bool {
        self.next >= self.descend.len()
    }
}

fn children_at(level: &[NodeDescription], index: usize) -> &[NodeDescription] {
    level.get(index).map_or(&[], |description| &description.children)
}

/// Outcome of a [`RenderPass::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassProgress {
    /// Budget spent, more units remain.
    Yielded,
    /// Every unit reconciled; ops are ready to commit.
    Complete,
}

/// Limits for one slice of work.
#[derive(Debug, Clone, Copy)]
pub struct StepBudget {
    /// Maximum number of units.
    pub units: usize,
    /// Stop once this instant has passed (checked after each unit).
    pub deadline: Option<Instant>,
}

impl StepBudget {
    /// A budget of `units` units with no time limit.
    pub fn units(units: usize) -> Self {
        Self {
            units,
            deadline: None,
        }
    }

    /// Unlimited budget; runs the pass to completion.
    pub fn unbounded() -> Self {
        Self::units(usize::MAX)
    }
}

// =============================================================================
// Render Pass
// =============================================================================

/// In-flight reconciliation of one root.
pub struct RenderPass {
    root: RootId,
    container: NodeId,
    payload: Payload,
    started: bool,
    frames: Vec<Frame>,
    ops: Vec<MutationOp>,
    staging: Staging,
    units: usize,
    slices: u32,
    started_at: Instant,
}

impl RenderPass {
    /// Begin a pass rendering `payload` into the root container `container`.
    pub fn new(root: RootId, container: NodeId, payload: Payload) -> Self {
        Self {
            root,
            container,
            payload,
            started: false,
            frames: Vec::new(),
            ops: Vec::new(),
            staging: Staging::new(),
            units: 0,
            slices: 0,
            started_at: Instant::now(),
        }
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// The description this pass renders.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Ops produced so far.
    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    /// Units reconciled so far.
    pub fn units_done(&self) -> usize {
        self.units
    }

    /// Slices this pass has run in.
    pub fn slices(&self) -> u32 {
        self.slices
    }

    /// Time since the pass began.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_complete(&self) -> bool {
        self.started && self.frames.iter().all(Frame::is_exhausted)
    }

    /// Units known to be waiting in the cursor.
    fn pending(&self) -> usize {
        self.frames
            .iter()
            .map(|frame| frame.descend.len().saturating_sub(frame.next))
            .sum()
    }

    /// Reconcile units until the budget runs out or the pass completes.
    pub fn step(
        &mut self,
        store: &mut NodeStore,
        budget: StepBudget,
    ) -> Result<PassProgress, ReconcileError> {
        self.slices += 1;
        let payload = Arc::clone(&self.payload);

        // Description list behind each frame, rebuilt once per slice
        let mut levels: Vec<&[NodeDescription]> = Vec::with_capacity(self.frames.len());
        if self.started {
            levels.push(std::slice::from_ref(&*payload));
            for depth in 1..self.frames.len() {
                let below = &self.frames[depth - 1];
                let (_, index) = below.descend[below.next - 1];
                let parent_level = levels[depth - 1];
                levels.push(children_at(parent_level, index));
            }
        }

        let mut done = 0;
        while done < budget.units {
            let (parent, new_descriptions) = if !self.started {
                self.started = true;
                (self.container, std::slice::from_ref(&*payload))
            } else {
                while self.frames.last().is_some_and(Frame::is_exhausted) {
                    self.frames.pop();
                    levels.pop();
                }
                let (Some(frame), Some(&siblings)) = (self.frames.last_mut(), levels.last()) else {
                    break;
                };
                let (node, index) = frame.descend[frame.next];
                frame.next += 1;
                (node, children_at(siblings, index))
            };

            let old_children = store.children(parent).to_vec();
            let level = reconcile_children(
                store,
                parent,
                &old_children,
                new_descriptions,
                &mut self.staging,
            )?;

            self.ops.extend(level.ops);
            self.frames.push(Frame {
                descend: level.descend,
                next: 0,
            });
            levels.push(new_descriptions);

            done += 1;
            self.units += 1;

            if budget.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
        }

        trace!(
            root = %self.root,
            units = done,
            pending = self.pending(),
            ops = self.ops.len(),
            "render slice"
        );

        Ok(if self.is_complete() {
            PassProgress::Complete
        } else {
            PassProgress::Yielded
        })
    }

    /// Abandon the pass, releasing everything it staged.
    pub fn discard(self, store: &mut NodeStore) {
        trace!(root = %self.root, staged = self.staging.staged_len(), "discarding render pass");
        self.staging.discard(store);
    }

    /// Finish a complete pass, yielding its ordered op list.
    ///
    /// Staged nodes are adopted by the ops: every one of them has an `Insert`.
    pub fn into_ops(self) -> Vec<MutationOp> {
        self.ops
    }
}

// =============================================================================
// Tests
// =============================================================================
