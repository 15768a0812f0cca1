//! Pipeline - driving the scheduler and watching it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! HostLoop ─idle slice─► Scheduler::tick_with_deadline ─► commit ─► RenderTarget
//!                                     │
//!                                     └─► on_commit / on_event listeners
//! ```
//!
//! - [`host`] - Idle deadlines and the host loops that grant them
//! - [`mount`] - Binds a scheduler to a host loop (mount/tick/run)
//! - [`observe`] - Commit metrics, scheduler events, profiler

pub mod host;
pub mod mount;
pub mod observe;

// Re-exports
pub use host::{FrameLoop, HostLoop, IdleDeadline, ImmediateLoop};
pub use mount::{mount, mount_with, MountHandle};
pub use observe::{
    CommitMetrics, CommitProfiler, CommitStatus, ListenerId, Observers, RootProfile,
    SchedulerEvent,
};
