//! Host loop - where idle time comes from.
//!
//! The host (browser, terminal event loop, test harness) decides when the
//! scheduler may run and for how long. It grants idle slices as
//! [`IdleDeadline`]s; the scheduler fills each one with render slices and
//! hands control back when it runs out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Idle Deadline
// =============================================================================

/// End of an idle slice granted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleDeadline {
    at: Instant,
}

impl IdleDeadline {
    /// A slice of `budget` starting now.
    pub fn new(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// A slice ending at `at`.
    pub fn until(at: Instant) -> Self {
        Self { at }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    /// Time left, zero once the deadline has passed.
    pub fn time_remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn did_timeout(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Source of idle slices.
pub trait HostLoop {
    /// Block until the host has idle time, then grant it.
    ///
    /// `None` means the host is shutting down and no more slices will come.
    fn request_idle_slice(&mut self) -> Option<IdleDeadline>;
}

// =============================================================================
// Frame Loop
// =============================================================================

/// Fixed-rate host: one slice per frame, each lasting a frame interval.
///
/// Stops granting slices once its running flag is cleared.
#[derive(Debug)]
pub struct FrameLoop {
    interval: Duration,
    next_frame: Option<Instant>,
    running: Arc<AtomicBool>,
}

impl FrameLoop {
    pub fn new(interval: Duration) -> Self {
        Self::with_running(interval, Arc::new(AtomicBool::new(true)))
    }

    /// Share an existing running flag (see [`MountHandle`](super::MountHandle)).
    pub fn with_running(interval: Duration, running: Arc<AtomicBool>) -> Self {
        Self {
            interval,
            next_frame: None,
            running,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl HostLoop for FrameLoop {
    fn request_idle_slice(&mut self) -> Option<IdleDeadline> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }

        // Wait for the frame boundary
        if let Some(next) = self.next_frame {
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            }
        }

        let start = Instant::now();
        let end = start + self.interval;
        self.next_frame = Some(end);
        Some(IdleDeadline::until(end))
    }
}

// =============================================================================
// Immediate Loop
// =============================================================================

/// Headless host: grants slices back to back without waiting.
///
/// Optionally bounded, which makes it handy for tests and batch rendering.
#[derive(Debug, Clone)]
pub struct ImmediateLoop {
    slice: Duration,
    remaining: Option<usize>,
}

impl ImmediateLoop {
    pub fn new(slice: Duration) -> Self {
        Self {
            slice,
            remaining: None,
        }
    }

    /// Stop after `count` slices.
    pub fn max_slices(mut self, count: usize) -> Self {
        self.remaining = Some(count);
        self
    }

    /// Slices left, `None` when unbounded.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }
}

impl HostLoop for ImmediateLoop {
    fn request_idle_slice(&mut self) -> Option<IdleDeadline> {
        match &mut self.remaining {
            Some(0) => return None,
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        Some(IdleDeadline::new(self.slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline() {
        let deadline = IdleDeadline::new(Duration::from_secs(60));
        assert!(!deadline.did_timeout());
        assert!(deadline.time_remaining() > Duration::from_secs(59));

        let past = IdleDeadline::until(Instant::now());
        assert!(past.did_timeout());
        assert_eq!(past.time_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_immediate_loop_bounded() {
        let mut host = ImmediateLoop::new(Duration::from_millis(1)).max_slices(2);
        assert!(host.request_idle_slice().is_some());
        assert!(host.request_idle_slice().is_some());
        assert!(host.request_idle_slice().is_none());
        assert_eq!(host.remaining(), Some(0));
    }

    #[test]
    fn test_frame_loop_paces_frames() {
        let mut host = FrameLoop::new(Duration::from_millis(5));
        let first = host.request_idle_slice().unwrap();
        let second = host.request_idle_slice().unwrap();
        assert!(second.at() >= first.at() + Duration::from_millis(5));
    }

    #[test]
    fn test_frame_loop_stops() {
        let mut host = FrameLoop::new(Duration::from_millis(1));
        host.stop();
        assert!(host.request_idle_slice().is_none());
    }
}
