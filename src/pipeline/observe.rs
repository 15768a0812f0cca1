//! Observer hooks - commit metrics and scheduler diagnostics.
//!
//! Listeners are plain closures registered on the scheduler and invoked
//! synchronously, in registration order, right after the thing they observe.
//! Nothing here depends on a particular metrics sink; [`CommitProfiler`] is
//! one collaborator built on top of the hook.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::error::CommitApplyError;
use crate::types::{Lane, RootId};

// =============================================================================
// Payloads
// =============================================================================

/// Outcome of a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitStatus {
    Committed,
    Failed(CommitApplyError),
}

impl CommitStatus {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitStatus::Committed)
    }
}

/// Timing and shape of one commit, delivered to `on_commit` listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitMetrics {
    pub root: RootId,
    pub lane: Lane,
    pub generation: u64,
    /// Scheduler-wide commit order, starting at 1.
    pub commit_seq: u64,
    /// When the commit began applying ops.
    pub start_time: Instant,
    /// Time spent applying ops.
    pub duration: Duration,
    /// Time from the start of the render pass to its completion.
    pub render_duration: Duration,
    pub op_count: usize,
    /// Slices the render pass ran in.
    pub slices: u32,
    /// Times this request was interrupted before it committed.
    pub interruptions: u32,
    pub status: CommitStatus,
}

/// Scheduling events, for diagnostics. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A render pass started for a claimed item.
    RenderStarted {
        root: RootId,
        lane: Lane,
        generation: u64,
    },
    /// A slice ended with work left and control returned to the host.
    Yielded { root: RootId },
    /// A pass was abandoned for strictly higher work on another root.
    Interrupted {
        root: RootId,
        by: RootId,
        lane: Lane,
    },
    /// A pass was abandoned because a newer request for its root arrived.
    Superseded { root: RootId, generation: u64 },
    /// A Transition item hit the interruption bound and now runs to completion.
    StarvationEscalation { root: RootId, interruptions: u32 },
    /// A root was torn down and its work cancelled.
    RootUnmounted { root: RootId },
}

// =============================================================================
// Listener Registry
// =============================================================================

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type CommitListener = Box<dyn FnMut(&CommitMetrics)>;
type EventListener = Box<dyn FnMut(&SchedulerEvent)>;

/// Registered listeners.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    commit: Vec<(ListenerId, CommitListener)>,
    events: Vec<(ListenerId, EventListener)>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub fn on_commit(&mut self, listener: impl FnMut(&CommitMetrics) + 'static) -> ListenerId {
        let id = self.next_id();
        self.commit.push((id, Box::new(listener)));
        id
    }

    pub fn on_event(&mut self, listener: impl FnMut(&SchedulerEvent) + 'static) -> ListenerId {
        let id = self.next_id();
        self.events.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener of either kind. Returns false for unknown ids.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.commit.len() + self.events.len();
        self.commit.retain(|(listener, _)| *listener != id);
        self.events.retain(|(listener, _)| *listener != id);
        before != self.commit.len() + self.events.len()
    }

    pub fn notify_commit(&mut self, metrics: &CommitMetrics) {
        for (_, listener) in &mut self.commit {
            listener(metrics);
        }
    }

    pub fn notify_event(&mut self, event: &SchedulerEvent) {
        for (_, listener) in &mut self.events {
            listener(event);
        }
    }
}

// =============================================================================
// Profiler
// =============================================================================

/// Aggregated commit statistics for one root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootProfile {
    pub commits: u64,
    pub failed: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub total_render_duration: Duration,
    pub interruptions: u64,
    pub last_commit_seq: u64,
}

/// Profiler-style `on_commit` collaborator.
///
/// Cloning shares the same statistics, so one clone can be handed to the
/// scheduler and another kept for reading.
#[derive(Clone, Default)]
pub struct CommitProfiler {
    profiles: Rc<RefCell<HashMap<RootId, RootProfile>>>,
}

impl CommitProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one commit.
    pub fn record(&self, metrics: &CommitMetrics) {
        let mut profiles = self.profiles.borrow_mut();
        let profile = profiles.entry(metrics.root).or_default();

        profile.commits += 1;
        if !metrics.status.is_committed() {
            profile.failed += 1;
        }
        profile.total_duration += metrics.duration;
        profile.max_duration = profile.max_duration.max(metrics.duration);
        profile.total_render_duration += metrics.render_duration;
        profile.interruptions += u64::from(metrics.interruptions);
        profile.last_commit_seq = metrics.commit_seq;
    }

    /// A listener feeding this profiler, for `Scheduler::on_commit`.
    pub fn listener(&self) -> impl FnMut(&CommitMetrics) + 'static {
        let profiler = self.clone();
        move |metrics| profiler.record(metrics)
    }

    pub fn profile(&self, root: RootId) -> Option<RootProfile> {
        self.profiles.borrow().get(&root).cloned()
    }

    pub fn reset(&self) {
        self.profiles.borrow_mut().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
