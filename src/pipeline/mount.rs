//! Mount API - Scheduler lifecycle on a host loop.
//!
//! Binds a [`Scheduler`] to a [`HostLoop`]: every idle slice the host grants
//! is filled with render work.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::pipeline::mount;
//!
//! let mut handle = mount::mount(SchedulerConfig::default(), my_target)?;
//! let queue = handle.queue();
//!
//! // Event handlers, any thread
//! queue.request_render(RootId(1), Lane::Urgent, app(&state));
//!
//! // Option 1: Run blocking until stopped
//! mount::run(&mut handle);
//!
//! // Option 2: Tick manually in your own loop
//! while mount::tick(&mut handle)? {
//!     // Your logic here
//! }
//!
//! // Clean up, getting the target back
//! let target = handle.unmount();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::host::{FrameLoop, HostLoop};
use crate::error::RenderResult;
use crate::renderer::RenderTarget;
use crate::scheduler::{Scheduler, SchedulerConfig, WorkQueue};

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`]: a scheduler, its host loop, and the
/// running flag (cleared by [`stop`](Self::stop) or when the host quits).
pub struct MountHandle<T: RenderTarget, H: HostLoop = FrameLoop> {
    scheduler: Scheduler<T>,
    host: H,
    running: Arc<AtomicBool>,
}

impl<T: RenderTarget, H: HostLoop> MountHandle<T, H> {
    pub fn scheduler(&self) -> &Scheduler<T> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<T> {
        &mut self.scheduler
    }

    /// Queue handle for event handlers.
    pub fn queue(&self) -> WorkQueue {
        self.scheduler.queue()
    }

    /// Check if still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop (sets running to false).
    /// Use this to trigger graceful shutdown from custom code.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// The running flag, for stopping from another thread.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Stop, tear every root down, and hand back the render target.
    pub fn unmount(mut self) -> T {
        self.stop();
        for root in self.scheduler.roots() {
            if let Err(err) = self.scheduler.unmount_root(root) {
                warn!(%root, error = %err, "unmount failed");
            }
        }
        self.scheduler.into_target()
    }
}

// =============================================================================
// Mount Functions
// =============================================================================

/// Mount a scheduler on a [`FrameLoop`] paced by `config.frame_interval_ms`.
pub fn mount<T: RenderTarget>(
    config: SchedulerConfig,
    target: T,
) -> RenderResult<MountHandle<T, FrameLoop>> {
    let running = Arc::new(AtomicBool::new(true));
    let host = FrameLoop::with_running(config.frame_interval(), running.clone());
    let scheduler = Scheduler::new(config, target)?;
    debug!(interval = ?host.interval(), "mounted on frame loop");
    Ok(MountHandle {
        scheduler,
        host,
        running,
    })
}

/// Mount an existing scheduler on any host loop.
pub fn mount_with<T: RenderTarget, H: HostLoop>(scheduler: Scheduler<T>, host: H) -> MountHandle<T, H> {
    MountHandle {
        scheduler,
        host,
        running: Arc::new(AtomicBool::new(true)),
    }
}

// =============================================================================
// Event Loop
// =============================================================================

/// Wait for one idle slice and fill it with render work.
///
/// # Returns
///
/// * `Ok(true)` - Continue running
/// * `Ok(false)` - Stop requested, or the host has no more slices
/// * `Err(e)` - A render pass or commit failed; the loop can keep going
pub fn tick<T: RenderTarget, H: HostLoop>(handle: &mut MountHandle<T, H>) -> RenderResult<bool> {
    if !handle.is_running() {
        return Ok(false);
    }

    let Some(deadline) = handle.host.request_idle_slice() else {
        handle.stop();
        return Ok(false);
    };
    handle.scheduler.tick_with_deadline(deadline)?;

    Ok(handle.is_running())
}

/// Run the loop until stopped or the host quits.
///
/// Render failures are logged and the loop continues; `on_commit` listeners
/// see failed commits as they happen.
pub fn run<T: RenderTarget, H: HostLoop>(handle: &mut MountHandle<T, H>) {
    loop {
        match tick(handle) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => warn!(error = %err, "render failed"),
        }
    }
}

/// Tick until the scheduler has no work left or the loop stops.
pub fn run_until_idle<T: RenderTarget, H: HostLoop>(
    handle: &mut MountHandle<T, H>,
) -> RenderResult<()> {
    while handle.scheduler.has_work() {
        if !tick(handle)? {
            break;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
