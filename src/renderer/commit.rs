//! Commit Applier - flushes a finished render pass.
//!
//! # Algorithm
//!
//! 1. For each op, in list order:
//!    - Deliver it to the render target (until the target first fails)
//!    - Apply it to the Node Store
//! 2. On a target failure, report how far the target got
//!
//! The store always ends up in the post-diff state. Target-side partial
//! mutation cannot be undone in general, so there is no rollback; keeping
//! the store ahead means the next render diffs against the intended tree
//! and never re-sends ops the target already received.

use tracing::{debug, error};

use crate::engine::NodeStore;
use crate::error::{CommitApplyError, TargetError};
use crate::types::{MutationOp, RootId};

/// Platform renderer collaborator (DOM, terminal, native...).
///
/// Called once per op, in order, on the scheduler's thread.
pub trait RenderTarget {
    fn apply_op(&mut self, op: &MutationOp) -> Result<(), TargetError>;
}

impl<T: RenderTarget + ?Sized> RenderTarget for Box<T> {
    fn apply_op(&mut self, op: &MutationOp) -> Result<(), TargetError> {
        (**self).apply_op(op)
    }
}

impl<T: RenderTarget + ?Sized> RenderTarget for &mut T {
    fn apply_op(&mut self, op: &MutationOp) -> Result<(), TargetError> {
        (**self).apply_op(op)
    }
}

/// Apply a completed pass's ops to the target and the store.
///
/// Returns the number of ops applied. Never interrupted, never retried.
pub fn apply<T: RenderTarget + ?Sized>(
    store: &mut NodeStore,
    target: &mut T,
    root: RootId,
    ops: &[MutationOp],
) -> Result<usize, CommitApplyError> {
    let mut failure: Option<CommitApplyError> = None;

    for (index, op) in ops.iter().enumerate() {
        if failure.is_none() {
            if let Err(source) = target.apply_op(op) {
                failure = Some(CommitApplyError {
                    root,
                    failed_at: index,
                    op: op.kind(),
                    source,
                });
            }
        }
        store.apply(op);
    }

    match failure {
        Some(err) => {
            error!(%root, failed_at = err.failed_at, ops = ops.len(), error = %err.source, "commit failed");
            Err(err)
        }
        None => {
            debug!(%root, ops = ops.len(), "commit applied");
            Ok(ops.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::text;
    use crate::reconciler::{reconcile_children, Staging};
    use crate::renderer::RecordingTarget;

    #[test]
    fn test_apply_in_order() {
        let mut store = NodeStore::new();
        let container = store.allocate_root();
        let mut staging = Staging::new();
        let descriptions = [text("a").key("a"), text("b").key("b")];
        let level =
            reconcile_children(&mut store, container, &[], &descriptions, &mut staging).unwrap();

        let mut target = RecordingTarget::new();
        let applied = apply(&mut store, &mut target, RootId(1), &level.ops).unwrap();

        assert_eq!(applied, 2);
        assert_eq!(target.ops(), level.ops.as_slice());
        assert_eq!(store.children(container), level.children.as_slice());
    }

    #[test]
    fn test_failure_stops_target_but_not_store() {
        let mut store = NodeStore::new();
        let container = store.allocate_root();
        let mut staging = Staging::new();
        let descriptions: Vec<_> = (0..5).map(|i| text(format!("{i}")).key(format!("{i}"))).collect();
        let level =
            reconcile_children(&mut store, container, &[], &descriptions, &mut staging).unwrap();

        let mut target = RecordingTarget::failing_at(2);
        let err = apply(&mut store, &mut target, RootId(9), &level.ops).unwrap_err();

        assert_eq!(err.failed_at, 2);
        assert_eq!(err.delivered(), 3);
        assert_eq!(err.root, RootId(9));
        assert_eq!(target.ops().len(), 3);
        // Store holds the post-diff tree
        assert_eq!(store.children(container).len(), 5);
    }
}
