//! Work Queue - pending render requests bucketed by lane.
//!
//! The queue is the only part of the core that other threads touch. Event
//! handlers clone a [`WorkQueue`] handle and call
//! [`request_render`](WorkQueue::request_render); the scheduler thread is
//! the single consumer.
//!
//! # Rules
//!
//! - A new request replaces every pending request for the same root whose
//!   lane is lower or equal; higher-lane requests stay and the new one waits
//!   behind them
//! - [`next_ready`](WorkQueue::next_ready) returns the highest lane first,
//!   oldest first within a lane, and never a root that is already in flight
//! - Interrupted items go back with their generation and enqueue time, and
//!   pick up any newer payload for their root

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::types::{Lane, Payload, RootId};

// =============================================================================
// Work Item
// =============================================================================

/// One pending render request.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub root: RootId,
    pub lane: Lane,
    pub payload: Payload,
    /// When the request entered the queue.
    pub enqueued_at: Instant,
    /// Queue-wide enqueue order, breaks ties between equal instants.
    pub seq: u64,
    /// Per-root counter, bumped by every request for the root.
    pub generation: u64,
    /// Times this request (or the ones it replaced in its lane) was interrupted.
    pub interruptions: u32,
}

/// What happened to an interrupted item handed back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Back in the queue; carries its interruption count.
    Requeued { interruptions: u32 },
    /// A newer request for the root with an equal or higher lane is pending,
    /// so the interrupted one was dropped.
    Superseded,
}

// =============================================================================
// Queue
// =============================================================================

#[derive(Default)]
struct QueueState {
    pending: Vec<WorkItem>,
    generations: HashMap<RootId, u64>,
    in_flight: HashMap<RootId, Lane>,
    next_seq: u64,
    yield_requested: bool,
}

/// Shared handle to the pending work of every root.
#[derive(Clone, Default)]
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry point for the component/event layer: render `description` into
    /// `root` at `lane`. Fire and forget.
    pub fn request_render(&self, root: RootId, lane: Lane, description: impl Into<Payload>) {
        self.enqueue(root, lane, description);
    }

    /// Add a request, superseding pending requests it outranks or equals.
    pub fn enqueue(&self, root: RootId, lane: Lane, payload: impl Into<Payload>) -> WorkItem {
        let mut state = self.state.lock();

        let generation = {
            let counter = state.generations.entry(root).or_insert(0);
            *counter += 1;
            *counter
        };
        let seq = state.next_seq;
        state.next_seq += 1;

        // Replace lower/equal lanes; the same lane hands over its interruption count
        let mut interruptions = 0;
        let mut replaced = 0;
        state.pending.retain(|item| {
            if item.root != root || item.lane > lane {
                return true;
            }
            if item.lane == lane {
                interruptions = interruptions.max(item.interruptions);
            }
            replaced += 1;
            false
        });

        let item = WorkItem {
            root,
            lane,
            payload: payload.into(),
            enqueued_at: Instant::now(),
            seq,
            generation,
            interruptions,
        };
        state.pending.push(item.clone());

        // Urgent work elsewhere: ask the scheduler to yield after its slice
        if lane == Lane::Urgent
            && state
                .in_flight
                .iter()
                .any(|(&other, &running)| other != root && running < Lane::Urgent)
        {
            state.yield_requested = true;
        }

        debug!(%root, %lane, generation, replaced, "enqueued render");
        item
    }

    /// Claim the next item to render and mark its root in flight.
    pub fn next_ready(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        let QueueState {
            pending, in_flight, ..
        } = &mut *state;

        let position = pending
            .iter()
            .enumerate()
            .filter(|(_, item)| !in_flight.contains_key(&item.root))
            .min_by_key(|(_, item)| (Reverse(item.lane), item.enqueued_at, item.seq))
            .map(|(position, _)| position)?;

        let item = pending.remove(position);
        in_flight.insert(item.root, item.lane);
        Some(item)
    }

    /// Highest pending item for a root other than `root` that strictly
    /// outranks `lane`.
    pub fn peek_preemptor(&self, root: RootId, lane: Lane) -> Option<WorkItem> {
        let state = self.state.lock();
        state
            .pending
            .iter()
            .filter(|item| item.root != root && item.lane > lane)
            .min_by_key(|item| (Reverse(item.lane), item.enqueued_at, item.seq))
            .cloned()
    }

    /// Pending item for `root` whose lane is at least `lane`.
    pub fn peek_superseding(&self, root: RootId, lane: Lane) -> Option<WorkItem> {
        let state = self.state.lock();
        state
            .pending
            .iter()
            .filter(|item| item.root == root && item.lane >= lane)
            .max_by_key(|item| (item.lane, item.generation))
            .cloned()
    }

    /// Hand an interrupted in-flight item back.
    ///
    /// Keeps its generation and enqueue time. A newer pending request for
    /// the root in a lower lane is folded in, so the retry renders the
    /// latest payload.
    pub fn requeue_interrupted(&self, mut item: WorkItem) -> Requeue {
        let mut state = self.state.lock();
        state.in_flight.remove(&item.root);
        item.interruptions += 1;

        if let Some(newer) = state
            .pending
            .iter_mut()
            .filter(|pending| pending.root == item.root && pending.lane >= item.lane)
            .max_by_key(|pending| (pending.lane, pending.generation))
        {
            if newer.lane == item.lane {
                newer.interruptions = newer.interruptions.max(item.interruptions);
            }
            return Requeue::Superseded;
        }

        // Fold newer lower-lane payloads into the retry
        let mut folded: Option<WorkItem> = None;
        state.pending.retain(|pending| {
            if pending.root != item.root || pending.lane >= item.lane {
                return true;
            }
            if folded.as_ref().is_none_or(|f| pending.generation > f.generation) {
                folded = Some(pending.clone());
            }
            false
        });
        if let Some(newer) = folded {
            if newer.generation > item.generation {
                item.payload = newer.payload;
                item.generation = newer.generation;
            }
        }

        let interruptions = item.interruptions;
        state.pending.push(item);
        Requeue::Requeued { interruptions }
    }

    /// Clear the in-flight marker after a commit or an aborted pass.
    pub fn finish(&self, root: RootId) {
        self.state.lock().in_flight.remove(&root);
    }

    /// Drop everything queued for `root` (root teardown).
    pub fn cancel_root(&self, root: RootId) -> usize {
        let mut state = self.state.lock();
        state.in_flight.remove(&root);
        let before = state.pending.len();
        state.pending.retain(|item| item.root != root);
        before - state.pending.len()
    }

    /// Consume a pending yield request.
    pub fn take_yield_request(&self) -> bool {
        std::mem::take(&mut self.state.lock().yield_requested)
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Number of pending (not in-flight) items.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    /// Pending items for `root`, highest lane first.
    pub fn pending_for(&self, root: RootId) -> Vec<WorkItem> {
        let state = self.state.lock();
        let mut items: Vec<WorkItem> = state
            .pending
            .iter()
            .filter(|item| item.root == root)
            .cloned()
            .collect();
        items.sort_by_key(|item| (Reverse(item.lane), item.enqueued_at, item.seq));
        items
    }

    pub fn has_pending(&self, root: RootId) -> bool {
        self.state.lock().pending.iter().any(|item| item.root == root)
    }

    /// Roots with pending work, in first-enqueued order.
    pub fn pending_roots(&self) -> Vec<RootId> {
        let state = self.state.lock();
        let mut roots: Vec<RootId> = Vec::new();
        for item in &state.pending {
            if !roots.contains(&item.root) {
                roots.push(item.root);
            }
        }
        roots
    }

    pub fn is_in_flight(&self, root: RootId) -> bool {
        self.state.lock().in_flight.contains_key(&root)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::text;
    use test_case::test_case;

    fn payload_text(item: &WorkItem) -> String {
        match item.payload.props.get("content") {
            Some(crate::types::PropValue::Str(s)) => s.clone(),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_urgent_supersedes_idle_for_same_root() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Idle, text("T0"));
        queue.enqueue(RootId(1), Lane::Urgent, text("T1"));

        assert_eq!(queue.len(), 1);
        let item = queue.next_ready().unwrap();
        assert_eq!(item.lane, Lane::Urgent);
        assert_eq!(payload_text(&item), "T1");
        assert_eq!(item.generation, 2);
    }

    #[test]
    fn test_lower_lane_waits_behind_higher() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Urgent, text("urgent"));
        queue.enqueue(RootId(1), Lane::Transition, text("transition"));

        assert_eq!(queue.len(), 2);
        let first = queue.next_ready().unwrap();
        assert_eq!(first.lane, Lane::Urgent);

        // Root is in flight: its deferred item is not handed out yet
        assert!(queue.next_ready().is_none());

        queue.finish(RootId(1));
        let second = queue.next_ready().unwrap();
        assert_eq!(payload_text(&second), "transition");
    }

    #[test]
    fn test_three_requests_collapse_to_one() {
        let queue = WorkQueue::new();
        for n in 0..3 {
            queue.enqueue(RootId(7), Lane::Transition, text(format!("v{n}")));
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(payload_text(&queue.next_ready().unwrap()), "v2");
    }

    #[test_case(Lane::Idle, Lane::Transition, Lane::Transition ; "transition beats idle")]
    #[test_case(Lane::Transition, Lane::Urgent, Lane::Urgent ; "urgent beats transition")]
    #[test_case(Lane::Idle, Lane::Urgent, Lane::Urgent ; "urgent beats idle")]
    fn test_priority_across_roots(first: Lane, second: Lane, expected: Lane) {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), first, text("a"));
        queue.enqueue(RootId(2), second, text("b"));
        assert_eq!(queue.next_ready().unwrap().lane, expected);
    }

    #[test]
    fn test_fifo_within_lane() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(3), Lane::Transition, text("c"));
        queue.enqueue(RootId(1), Lane::Transition, text("a"));
        queue.enqueue(RootId(2), Lane::Transition, text("b"));

        let order: Vec<RootId> = std::iter::from_fn(|| queue.next_ready())
            .map(|item| item.root)
            .collect();
        assert_eq!(order, vec![RootId(3), RootId(1), RootId(2)]);
    }

    #[test]
    fn test_yield_requested_for_urgent_elsewhere() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Transition, text("slow"));
        queue.next_ready().unwrap();
        assert!(!queue.take_yield_request());

        queue.enqueue(RootId(2), Lane::Urgent, text("click"));
        assert!(queue.take_yield_request());
        assert!(!queue.take_yield_request());

        // Same root does not raise it
        queue.enqueue(RootId(1), Lane::Urgent, text("again"));
        assert!(!queue.take_yield_request());
    }

    #[test]
    fn test_preemptor_and_superseding() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Transition, text("a"));
        let running = queue.next_ready().unwrap();

        assert!(queue.peek_preemptor(running.root, running.lane).is_none());
        queue.enqueue(RootId(2), Lane::Transition, text("b"));
        assert!(queue.peek_preemptor(running.root, running.lane).is_none());
        queue.enqueue(RootId(3), Lane::Urgent, text("c"));
        assert_eq!(
            queue.peek_preemptor(running.root, running.lane).unwrap().root,
            RootId(3)
        );

        assert!(queue.peek_superseding(RootId(1), Lane::Transition).is_none());
        queue.enqueue(RootId(1), Lane::Idle, text("later"));
        assert!(queue.peek_superseding(RootId(1), Lane::Transition).is_none());
        queue.enqueue(RootId(1), Lane::Transition, text("newer"));
        assert!(queue.peek_superseding(RootId(1), Lane::Transition).is_some());
    }

    #[test]
    fn test_requeue_keeps_generation_and_order() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Transition, text("first"));
        queue.enqueue(RootId(2), Lane::Transition, text("second"));
        let item = queue.next_ready().unwrap();
        let generation = item.generation;

        assert_eq!(
            queue.requeue_interrupted(item),
            Requeue::Requeued { interruptions: 1 }
        );

        // Still ahead of root 2 within the lane
        let again = queue.next_ready().unwrap();
        assert_eq!(again.root, RootId(1));
        assert_eq!(again.generation, generation);
        assert_eq!(again.interruptions, 1);
    }

    #[test]
    fn test_requeue_superseded_by_newer_same_lane() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Transition, text("old"));
        let item = queue.next_ready().unwrap();
        queue.enqueue(RootId(1), Lane::Transition, text("new"));

        assert_eq!(queue.requeue_interrupted(item), Requeue::Superseded);
        let next = queue.next_ready().unwrap();
        assert_eq!(payload_text(&next), "new");
        assert_eq!(next.interruptions, 1);
    }

    #[test]
    fn test_requeue_folds_newer_lower_lane_payload() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Transition, text("old"));
        let item = queue.next_ready().unwrap();
        queue.enqueue(RootId(1), Lane::Idle, text("newest"));

        assert!(matches!(
            queue.requeue_interrupted(item),
            Requeue::Requeued { .. }
        ));
        assert_eq!(queue.len(), 1);
        let next = queue.next_ready().unwrap();
        assert_eq!(next.lane, Lane::Transition);
        assert_eq!(payload_text(&next), "newest");
    }

    #[test]
    fn test_cancel_root() {
        let queue = WorkQueue::new();
        queue.enqueue(RootId(1), Lane::Urgent, text("a"));
        queue.enqueue(RootId(1), Lane::Idle, text("b"));
        queue.enqueue(RootId(2), Lane::Idle, text("c"));

        assert_eq!(queue.cancel_root(RootId(1)), 2);
        assert!(!queue.has_pending(RootId(1)));
        assert_eq!(queue.pending_roots(), vec![RootId(2)]);
    }

    #[test]
    fn test_enqueue_from_other_threads() {
        let queue = WorkQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        queue.request_render(RootId(n), Lane::Transition, text(format!("{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 4);
        for n in 0..4 {
            let items = queue.pending_for(RootId(n));
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].generation, 10);
            assert_eq!(payload_text(&items[0]), "9");
        }
    }
}
