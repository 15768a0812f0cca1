//! # spark-fiber
//!
//! Concurrent rendering core: prioritized, interruptible reconciliation of
//! declarative UI trees.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! reactive root status.
//!
//! ## Architecture
//!
//! Render requests land in a shared [`WorkQueue`](scheduler::WorkQueue),
//! bucketed by [`Lane`]. The [`Scheduler`](scheduler::Scheduler) claims the
//! highest-priority request and reconciles it in small slices, yielding to
//! the host between them. Higher-priority work on another root interrupts
//! an in-flight pass; a complete pass is committed in one go.
//!
//! ```text
//! request_render → WorkQueue → RenderPass (sliced, interruptible) → commit → RenderTarget
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (RootId, NodeId, Lane, NodeDescription, MutationOp)
//! - [`engine`] - Node Store arena
//! - [`reconciler`] - Keyed diff and resumable render passes
//! - [`scheduler`] - Work queue, lanes, work loop
//! - [`renderer`] - Commit applier and render targets
//! - [`pipeline`] - Host loops, mount/tick/run, observers
//! - [`primitives`] - Description builders

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod reconciler;
pub mod renderer;
pub mod scheduler;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use error::{
    CommitApplyError, ConfigError, ReconcileError, RenderError, RenderResult, TargetError,
};

pub use engine::{Node, NodeStore};

pub use reconciler::{reconcile_children, PassProgress, RenderPass, StepBudget};

pub use renderer::{HeadlessTarget, RecordingTarget, RenderTarget};

pub use scheduler::{
    RootPhase, Scheduler, SchedulerConfig, SliceBudget, TickStatus, WorkItem, WorkQueue,
};

pub use pipeline::{
    mount, mount_with, CommitMetrics, CommitProfiler, CommitStatus, FrameLoop, HostLoop,
    IdleDeadline, ImmediateLoop, MountHandle, SchedulerEvent,
};

pub use primitives::{box_element, element, input, text};
