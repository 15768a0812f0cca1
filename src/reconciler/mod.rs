//! Reconciler - keyed tree diffing in resumable slices.
//!
//! - [`diff`] - One parent's child list: match by key, emit minimal ops
//! - [`pass`] - A whole root, as a resumable cursor of child lists
//!
//! The reconciler only reads the committed tree and stages new nodes; the
//! commit is what makes its ops real.

pub mod diff;
pub mod pass;

pub use diff::{reconcile_children, LevelResult, Staging};
pub use pass::{PassProgress, RenderPass, StepBudget};
