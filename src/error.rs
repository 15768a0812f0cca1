//! Error types.
//!
//! Structural mistakes (duplicate keys) and render-target failures are
//! surfaced to the caller. Interruption and escalation are scheduling
//! events, not errors, and never show up here.

use thiserror::Error;

use crate::types::{NodeId, RootId};

/// Reconciler failure. Aborts the render pass that detected it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Two siblings in a new description share an explicit key.
    #[error("duplicate key {key:?} among the children of {parent}")]
    DuplicateKey {
        /// Node whose children were being reconciled
        parent: NodeId,
        /// The repeated key
        key: String,
    },
}

/// Failure reported by a render target while applying one op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TargetError {
    message: String,
}

impl TargetError {
    /// Create a target error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The target's message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A commit stopped part way because the render target rejected an op.
///
/// Ops before `failed_at` were applied, the op at `failed_at` was delivered
/// and failed, nothing after it reached the target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("commit for {root} failed at op {failed_at} ({op}): {source}")]
pub struct CommitApplyError {
    /// Root whose commit failed
    pub root: RootId,
    /// Index of the rejected op in the commit's op list
    pub failed_at: usize,
    /// Kind of the rejected op
    pub op: &'static str,
    /// Error raised by the target
    #[source]
    pub source: TargetError,
}

impl CommitApplyError {
    /// Number of ops the target received, the failing one included.
    pub fn delivered(&self) -> usize {
        self.failed_at + 1
    }
}

/// Invalid scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("slice budget must be greater than zero")]
    EmptySliceBudget,

    #[error("frame interval must be greater than zero")]
    ZeroFrameInterval,
}

/// Error surfaced by [`Scheduler::tick`](crate::scheduler::Scheduler::tick).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    CommitApply(#[from] CommitApplyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Specialized Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_error_delivered_count() {
        let err = CommitApplyError {
            root: RootId(1),
            failed_at: 2,
            op: "update",
            source: TargetError::new("boom"),
        };
        assert_eq!(err.delivered(), 3);
        assert_eq!(
            err.to_string(),
            "commit for root#1 failed at op 2 (update): boom"
        );
    }

    #[test]
    fn test_render_error_from() {
        let err: RenderError = ConfigError::EmptySliceBudget.into();
        assert!(matches!(err, RenderError::Config(_)));
    }
}
