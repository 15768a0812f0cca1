//! Work loop - drives render passes slice by slice.
//!
//! The scheduler owns the Node Store, the render target and at most one
//! in-flight [`RenderPass`]. Each [`tick`](Scheduler::tick) runs one bounded
//! slice of that pass. The queue is checked before a resumed slice and again
//! before a finished pass commits:
//!
//! ```text
//! tick ─► claim or resume ─► boundary check ─► step(budget) ─► Yielded
//!                                 │                  │
//!                                 │                  └─► Complete ─► boundary check ─► commit
//!                                 ├─► newer request for the root ─► Superseded
//!                                 └─► higher lane on another root ─► Interrupted
//! ```
//!
//! Commits are never interrupted once they start. Root status is published through
//! spark-signals so UI code can react to it (`isPending`-style spinners).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use spark_signals::{signal, Signal};
use tracing::{debug, warn};

use super::config::SchedulerConfig;
use super::lanes::{Requeue, WorkItem, WorkQueue};
use crate::engine::NodeStore;
use crate::error::RenderResult;
use crate::pipeline::{
    CommitMetrics, CommitStatus, IdleDeadline, ListenerId, Observers, SchedulerEvent,
};
use crate::reconciler::{PassProgress, RenderPass};
use crate::renderer::{commit, RenderTarget};
use crate::types::{Lane, MutationOp, NodeFlags, NodeId, Payload, RootId};

// =============================================================================
// Status Types
// =============================================================================

/// Lifecycle of one root, as published by [`Scheduler::phase_signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RootPhase {
    /// Nothing queued, nothing rendered yet (or unmounted).
    #[default]
    Idle,
    /// Work is queued for the root.
    Scheduled,
    /// A render pass for the root is in flight.
    Rendering,
    /// The last pass committed.
    Committed,
    /// The last pass was abandoned for higher-lane work; it will be retried.
    Interrupted,
    /// The last pass or its commit failed.
    Failed,
}

/// What one [`Scheduler::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// No work anywhere.
    Idle,
    /// The slice ended with the pass still in flight.
    Yielded { root: RootId },
    /// The pass was abandoned for higher work on another root and requeued.
    Interrupted { root: RootId },
    /// The pass was abandoned because a newer request for its root arrived.
    Superseded { root: RootId },
    /// The pass completed and its ops were applied.
    Committed { root: RootId, generation: u64 },
}

struct RootRecord {
    container: NodeId,
    phase: Signal<RootPhase>,
    pending: Signal<bool>,
}

struct InFlight {
    item: WorkItem,
    pass: RenderPass,
    /// Starvation guard tripped: no preemption, no supersession.
    escalated: bool,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Single-threaded cooperative render scheduler.
pub struct Scheduler<T: RenderTarget> {
    config: SchedulerConfig,
    queue: WorkQueue,
    store: NodeStore,
    target: T,
    roots: HashMap<RootId, RootRecord>,
    current: Option<InFlight>,
    commit_seq: u64,
    observers: Observers,
}

impl<T: RenderTarget> Scheduler<T> {
    /// Create a scheduler rendering into `target`.
    pub fn new(config: SchedulerConfig, target: T) -> RenderResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            queue: WorkQueue::new(),
            store: NodeStore::new(),
            target,
            roots: HashMap::new(),
            current: None,
            commit_seq: 0,
            observers: Observers::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// A handle to the queue, for event handlers on any thread.
    pub fn queue(&self) -> WorkQueue {
        self.queue.clone()
    }

    /// Shorthand for [`WorkQueue::request_render`].
    pub fn request_render(&self, root: RootId, lane: Lane, description: impl Into<Payload>) {
        self.queue.request_render(root, lane, description);
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Host container of a known root.
    pub fn container(&self, root: RootId) -> Option<NodeId> {
        self.roots.get(&root).map(|record| record.container)
    }

    /// True while anything is queued or in flight.
    pub fn has_work(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    /// Roots the scheduler knows about.
    pub fn roots(&self) -> Vec<RootId> {
        self.roots.keys().copied().collect()
    }

    /// Consume the scheduler, handing back its render target.
    pub fn into_target(self) -> T {
        self.target
    }

    /// Root whose pass is in flight, if any.
    pub fn in_flight(&self) -> Option<(RootId, Lane)> {
        self.current
            .as_ref()
            .map(|current| (current.item.root, current.item.lane))
    }

    /// Commits so far, failed ones included.
    pub fn commit_count(&self) -> u64 {
        self.commit_seq
    }

    /// Current phase of a root. Unknown roots are `Idle`.
    pub fn phase(&self, root: RootId) -> RootPhase {
        self.roots
            .get(&root)
            .map_or(RootPhase::Idle, |record| record.phase.get())
    }

    /// Reactive phase of a root.
    pub fn phase_signal(&mut self, root: RootId) -> Signal<RootPhase> {
        self.ensure_root(root).phase.clone()
    }

    /// Reactive "non-urgent work queued or rendering" flag of a root.
    pub fn pending_signal(&mut self, root: RootId) -> Signal<bool> {
        let signal = self.ensure_root(root).pending.clone();
        self.refresh_pending(root);
        signal
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    pub fn on_commit(&mut self, listener: impl FnMut(&CommitMetrics) + 'static) -> ListenerId {
        self.observers.on_commit(listener)
    }

    pub fn on_event(&mut self, listener: impl FnMut(&SchedulerEvent) + 'static) -> ListenerId {
        self.observers.on_event(listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.observers.off(id)
    }

    // -------------------------------------------------------------------------
    // Driving
    // -------------------------------------------------------------------------

    /// Run one bounded slice.
    pub fn tick(&mut self) -> RenderResult<TickStatus> {
        self.slice(None)
    }

    /// Run slices until the host's deadline passes, the queue runs dry, or
    /// urgent work asks for the host to get control back.
    pub fn tick_with_deadline(&mut self, deadline: IdleDeadline) -> RenderResult<TickStatus> {
        loop {
            let status = self.slice(Some(deadline.at()))?;
            if status == TickStatus::Idle
                || deadline.did_timeout()
                || self.queue.take_yield_request()
            {
                return Ok(status);
            }
        }
    }

    /// Tick until no work is left. Returns the number of commits.
    ///
    /// Stops at the first error; the failed work is already cleared, so
    /// calling again continues with the rest.
    pub fn run_until_idle(&mut self) -> RenderResult<usize> {
        let mut commits = 0;
        loop {
            match self.tick()? {
                TickStatus::Idle => return Ok(commits),
                TickStatus::Committed { .. } => commits += 1,
                _ => {}
            }
        }
    }

    /// Render `description` into `root` now, at the Urgent lane.
    ///
    /// Ticks until the root has nothing queued or in flight; work that
    /// outranks it runs first.
    pub fn flush_sync(&mut self, root: RootId, description: impl Into<Payload>) -> RenderResult<()> {
        self.queue.enqueue(root, Lane::Urgent, description);
        while self.queue.has_pending(root) || self.queue.is_in_flight(root) {
            if self.tick()? == TickStatus::Idle {
                break;
            }
        }
        Ok(())
    }

    /// Tear a root down: cancel its work, remove its nodes from the target
    /// and release them.
    pub fn unmount_root(&mut self, root: RootId) -> RenderResult<()> {
        let cancelled = self.queue.cancel_root(root);

        if self
            .current
            .as_ref()
            .is_some_and(|current| current.item.root == root)
        {
            if let Some(current) = self.current.take() {
                current.pass.discard(&mut self.store);
            }
        }

        let Some(record) = self.roots.remove(&root) else {
            return Ok(());
        };

        let ops: Vec<MutationOp> = self
            .store
            .children(record.container)
            .iter()
            .map(|&node| MutationOp::Remove { node })
            .collect();
        let result = commit::apply(&mut self.store, &mut self.target, root, &ops);
        self.store.release(record.container);

        record.phase.set(RootPhase::Idle);
        record.pending.set(false);
        debug!(%root, cancelled, removed = ops.len(), "root unmounted");
        self.observers
            .notify_event(&SchedulerEvent::RootUnmounted { root });

        result?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Slice
    // -------------------------------------------------------------------------

    fn slice(&mut self, deadline: Option<Instant>) -> RenderResult<TickStatus> {
        self.sync_roots();

        if self.current.is_none() {
            let Some(item) = self.queue.next_ready() else {
                // Nothing left to yield for
                self.queue.take_yield_request();
                return Ok(TickStatus::Idle);
            };
            self.begin(item);
        } else if let Some(status) = self.check_boundary() {
            return Ok(status);
        }

        let budget = self.config.step_budget(deadline);
        let Some(current) = self.current.as_mut() else {
            return Ok(TickStatus::Idle);
        };
        let root = current.item.root;

        match current.pass.step(&mut self.store, budget) {
            Ok(PassProgress::Complete) => match self.check_boundary() {
                Some(status) => Ok(status),
                None => self.commit(),
            },
            Ok(PassProgress::Yielded) => {
                self.observers
                    .notify_event(&SchedulerEvent::Yielded { root });
                Ok(TickStatus::Yielded { root })
            }
            Err(err) => {
                if let Some(current) = self.current.take() {
                    current.pass.discard(&mut self.store);
                }
                self.queue.finish(root);
                self.set_phase(root, RootPhase::Failed);
                self.refresh_pending(root);
                warn!(%root, error = %err, "render pass aborted");
                Err(err.into())
            }
        }
    }

    fn begin(&mut self, item: WorkItem) {
        let container = {
            let record = self.ensure_root(item.root);
            record.phase.set(RootPhase::Rendering);
            record.container
        };

        let escalated = item.lane == Lane::Transition
            && item.interruptions > self.config.max_interruptions;
        if escalated {
            warn!(
                root = %item.root,
                interruptions = item.interruptions,
                "transition starved, running to completion"
            );
            self.observers
                .notify_event(&SchedulerEvent::StarvationEscalation {
                    root: item.root,
                    interruptions: item.interruptions,
                });
        }

        self.observers.notify_event(&SchedulerEvent::RenderStarted {
            root: item.root,
            lane: item.lane,
            generation: item.generation,
        });

        let pass = RenderPass::new(item.root, container, Arc::clone(&item.payload));
        self.current = Some(InFlight {
            item,
            pass,
            escalated,
        });
        self.refresh_pending_current();
    }

    /// Abandon the in-flight pass if something should run instead.
    fn check_boundary(&mut self) -> Option<TickStatus> {
        let (root, lane) = match &self.current {
            Some(current) if !current.escalated => (current.item.root, current.item.lane),
            _ => return None,
        };

        if self.queue.peek_superseding(root, lane).is_some() {
            let current = self.current.take()?;
            let generation = current.item.generation;
            current.pass.discard(&mut self.store);
            self.queue.finish(root);
            self.set_phase(root, RootPhase::Scheduled);

            debug!(%root, generation, "render superseded");
            self.observers
                .notify_event(&SchedulerEvent::Superseded { root, generation });
            return Some(TickStatus::Superseded { root });
        }

        if !lane.is_interruptible() {
            return None;
        }
        let preemptor = self.queue.peek_preemptor(root, lane)?;
        let current = self.current.take()?;
        current.pass.discard(&mut self.store);
        // Consumed by this interruption
        self.queue.take_yield_request();

        match self.queue.requeue_interrupted(current.item) {
            Requeue::Requeued { interruptions } => {
                debug!(%root, by = %preemptor.root, interruptions, "render interrupted");
            }
            Requeue::Superseded => {
                debug!(%root, by = %preemptor.root, "render interrupted, newer request pending");
            }
        }
        self.set_phase(root, RootPhase::Interrupted);
        self.observers.notify_event(&SchedulerEvent::Interrupted {
            root,
            by: preemptor.root,
            lane,
        });
        Some(TickStatus::Interrupted { root })
    }

    fn commit(&mut self) -> RenderResult<TickStatus> {
        let Some(InFlight { item, pass, .. }) = self.current.take() else {
            return Ok(TickStatus::Idle);
        };

        let render_duration = pass.elapsed();
        let slices = pass.slices();
        let ops = pass.into_ops();

        let start_time = Instant::now();
        let result = commit::apply(&mut self.store, &mut self.target, item.root, &ops);
        let duration = start_time.elapsed();

        self.queue.finish(item.root);
        self.commit_seq += 1;

        let status = match &result {
            Ok(_) => CommitStatus::Committed,
            Err(err) => CommitStatus::Failed(err.clone()),
        };
        self.set_phase(
            item.root,
            if status.is_committed() {
                RootPhase::Committed
            } else {
                RootPhase::Failed
            },
        );
        self.refresh_pending(item.root);

        debug!(
            root = %item.root,
            lane = %item.lane,
            generation = item.generation,
            commit_seq = self.commit_seq,
            ops = ops.len(),
            slices,
            "committed"
        );

        let metrics = CommitMetrics {
            root: item.root,
            lane: item.lane,
            generation: item.generation,
            commit_seq: self.commit_seq,
            start_time,
            duration,
            render_duration,
            op_count: ops.len(),
            slices,
            interruptions: item.interruptions,
            status,
        };
        self.observers.notify_commit(&metrics);

        result?;
        Ok(TickStatus::Committed {
            root: item.root,
            generation: item.generation,
        })
    }

    // -------------------------------------------------------------------------
    // Root Status
    // -------------------------------------------------------------------------

    fn ensure_root(&mut self, root: RootId) -> &mut RootRecord {
        let store = &mut self.store;
        self.roots.entry(root).or_insert_with(|| RootRecord {
            container: store.allocate_root(),
            phase: signal(RootPhase::Idle),
            pending: signal(false),
        })
    }

    fn set_phase(&mut self, root: RootId, phase: RootPhase) {
        if let Some(record) = self.roots.get(&root) {
            if record.phase.get() != phase {
                record.phase.set(phase);
            }
        }
    }

    /// Move roots with queued work to `Scheduled` and refresh pending flags.
    fn sync_roots(&mut self) {
        for root in self.queue.pending_roots() {
            self.ensure_root(root);
        }

        let in_flight = self.current.as_ref().map(|current| current.item.root);
        let roots: Vec<RootId> = self.roots.keys().copied().collect();
        for root in roots {
            if Some(root) != in_flight {
                let phase = self.phase(root);
                if self.queue.has_pending(root) {
                    self.set_phase(root, RootPhase::Scheduled);
                } else if phase == RootPhase::Interrupted || phase == RootPhase::Scheduled {
                    self.set_phase(root, RootPhase::Idle);
                }
            }
            self.refresh_pending(root);
        }
    }

    fn refresh_pending_current(&mut self) {
        if let Some(root) = self.current.as_ref().map(|current| current.item.root) {
            self.refresh_pending(root);
        }
    }

    /// Refresh the pending signal and the container's pending-work flag.
    fn refresh_pending(&mut self, root: RootId) {
        let (rendering, rendering_lane) = match &self.current {
            Some(current) if current.item.root == root => (true, Some(current.item.lane)),
            _ => (false, None),
        };
        let queued = self.queue.pending_for(root);

        let pending = rendering_lane.is_some_and(|lane| lane != Lane::Urgent)
            || queued.iter().any(|item| item.lane != Lane::Urgent);
        let has_work = rendering || !queued.is_empty();

        let Some(record) = self.roots.get(&root) else {
            return;
        };
        if record.pending.get() != pending {
            record.pending.set(pending);
        }

        let container = record.container;
        if has_work {
            self.store.insert_flags(container, NodeFlags::HAS_PENDING_WORK);
        } else {
            self.store.remove_flags(container, NodeFlags::HAS_PENDING_WORK);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
