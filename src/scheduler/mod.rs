//! Scheduler - lanes, slices, interruption.
//!
//! - [`lanes`] - The shared [`WorkQueue`] of pending requests
//! - [`config`] - [`SchedulerConfig`], slice budget and starvation bound
//! - [`work_loop`] - The [`Scheduler`] that runs passes and commits them
//!
//! ```text
//! event handler ──request_render──► WorkQueue ──next_ready──► Scheduler ──commit──► RenderTarget
//!   (any thread)                                              (host thread)
//! ```

pub mod config;
pub mod lanes;
pub mod work_loop;

pub use config::{SchedulerConfig, SliceBudget};
pub use lanes::{Requeue, WorkItem, WorkQueue};
pub use work_loop::{RootPhase, Scheduler, TickStatus};
