//! Time-ordered event scheduler.
//!
//! The [`EventScheduler`] is a min-priority queue of pending zero-argument
//! callbacks keyed by absolute simulation time. It knows nothing about
//! entities; anything that can produce an `(execution_time, action)` pair may
//! use it.
//!
//! Events at the same execution time fire in FIFO order: every event gets a
//! monotonically increasing sequence number at schedule time, and the heap
//! orders by `(execution_time, seq)`. This makes same-timestamp firing order
//! deterministic and reproducible across runs.
//!
//! A firing callback may schedule follow-up events through a
//! [`SchedulerHandle`]; follow-ups are visited within the same
//! [`fire_due`](EventScheduler::fire_due) call when their execution time is
//! also due. To make that re-entrancy safe, the queue lives behind a shared
//! cell and the in-progress pop releases its borrow before the callback runs.
//!
//! There is no cancellation primitive. Once scheduled, an event will fire;
//! callers that need cancellation layer a guard flag above this contract.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::time::{SimDt, SimTime};

/// A deferred zero-argument callback.
pub type EventAction = Box<dyn FnMut() + 'static>;

// ---------------------------------------------------------------------------
// ScheduledEvent
// ---------------------------------------------------------------------------

/// A pending event: an absolute execution time, a tie-break sequence number,
/// and the action to invoke.
///
/// Owned exclusively by the scheduler's queue from `schedule` until it fires.
struct ScheduledEvent {
    /// Absolute simulation time (seconds) at which the event becomes due.
    execution_time: SimTime,
    /// Schedule-order sequence number; breaks ties at equal execution times.
    seq: u64,
    /// The action to invoke when the event fires.
    action: EventAction,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
            && self
                .execution_time
                .total_cmp(&other.execution_time)
                .is_eq()
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    /// Orders by `(execution_time, seq)` using `total_cmp`, so the ordering
    /// is lawful even for exotic float values.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.execution_time
            .total_cmp(&other.execution_time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

// ---------------------------------------------------------------------------
// SchedulerInner
// ---------------------------------------------------------------------------

/// Queue state shared between the scheduler and its handles.
struct SchedulerInner {
    /// Min-heap on `(execution_time, seq)` via `Reverse`.
    queue: BinaryHeap<Reverse<ScheduledEvent>>,
    /// Next sequence number to assign at schedule time.
    next_seq: u64,
}

impl SchedulerInner {
    fn push(&mut self, execution_time: SimTime, action: EventAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(ScheduledEvent {
            execution_time,
            seq,
            action,
        }));
        debug!(
            execution_time,
            seq,
            queue_len = self.queue.len(),
            "event scheduled"
        );
    }
}

// ---------------------------------------------------------------------------
// EventScheduler
// ---------------------------------------------------------------------------

/// Min-priority queue of pending callbacks keyed by absolute simulation time.
///
/// Deliberately single-threaded: events fire synchronously on the calling
/// thread, one at a time, in `(execution_time, seq)` order.
pub struct EventScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl EventScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                queue: BinaryHeap::new(),
                next_seq: 0,
            })),
        }
    }

    /// A cloneable handle for scheduling events from inside event callbacks.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Schedule an event `delay` seconds after `now`.
    ///
    /// Any delay is accepted, including zero or negative: an already-due event
    /// is legal and fires on the next [`fire_due`](Self::fire_due) call.
    pub fn schedule(&mut self, now: SimTime, delay: SimDt, action: EventAction) {
        self.inner.borrow_mut().push(now + delay, action);
    }

    /// Schedule an event at an absolute execution time.
    pub fn schedule_at(&mut self, execution_time: SimTime, action: EventAction) {
        self.inner.borrow_mut().push(execution_time, action);
    }

    /// Pop and invoke every event whose execution time is `<= now`, in
    /// `(execution_time, seq)` order. Returns the number of events fired.
    ///
    /// Each popped event fires exactly once, synchronously, before the next
    /// pop is considered. A callback that schedules new events (through a
    /// [`SchedulerHandle`]) will see them visited in this same call when they
    /// are also due. Callback panics are not caught; they propagate to the
    /// caller.
    pub fn fire_due(&mut self, now: SimTime) -> usize {
        let mut fired = 0;
        loop {
            // Pop under the borrow, invoke outside it, so the callback may
            // schedule follow-ups through a handle.
            let next = {
                let mut inner = self.inner.borrow_mut();
                let due = inner
                    .queue
                    .peek()
                    .map_or(false, |entry| entry.0.execution_time <= now);
                if due {
                    inner.queue.pop()
                } else {
                    None
                }
            };
            let Some(Reverse(mut event)) = next else {
                break;
            };
            trace!(
                execution_time = event.execution_time,
                seq = event.seq,
                now,
                "event fired"
            );
            (event.action)();
            fired += 1;
        }
        fired
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Whether no events are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Execution time of the earliest pending event, if any.
    pub fn next_due(&self) -> Option<SimTime> {
        self.inner
            .borrow()
            .queue
            .peek()
            .map(|entry| entry.0.execution_time)
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SchedulerHandle
// ---------------------------------------------------------------------------

/// A cloneable scheduling capability over a live [`EventScheduler`].
///
/// Handles only schedule; firing stays with the owning scheduler. Safe to use
/// from inside a firing callback.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl SchedulerHandle {
    /// Schedule an event `delay` seconds after `now`.
    pub fn schedule(&self, now: SimTime, delay: SimDt, action: EventAction) {
        self.inner.borrow_mut().push(now + delay, action);
    }

    /// Schedule an event at an absolute execution time.
    pub fn schedule_at(&self, execution_time: SimTime, action: EventAction) {
        self.inner.borrow_mut().push(execution_time, action);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared log of fired markers, for asserting firing order.
    fn marker_log() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, marker: &'static str) -> EventAction {
        let log = Rc::clone(log);
        Box::new(move || log.borrow_mut().push(marker))
    }

    #[test]
    fn new_scheduler_is_empty() {
        let scheduler = EventScheduler::new();
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.len(), 0);
        assert_eq!(scheduler.next_due(), None);
    }

    #[test]
    fn event_does_not_fire_before_its_time() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(0.0, 3.0, record(&log, "a"));

        assert_eq!(scheduler.fire_due(0.0), 0);
        assert_eq!(scheduler.fire_due(2.999), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn event_fires_exactly_once() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(0.0, 1.0, record(&log, "a"));

        assert_eq!(scheduler.fire_due(1.0), 1);
        // Repeated calls with the same `now` must not fire it again.
        assert_eq!(scheduler.fire_due(1.0), 0);
        assert_eq!(scheduler.fire_due(2.0), 0);
        assert_eq!(log.borrow().len(), 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn events_fire_in_time_order() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(0.0, 3.0, record(&log, "third"));
        scheduler.schedule(0.0, 1.0, record(&log, "first"));
        scheduler.schedule(0.0, 2.0, record(&log, "second"));

        scheduler.fire_due(10.0);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn same_time_events_fire_in_fifo_order() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        for marker in ["a", "b", "c", "d"] {
            scheduler.schedule(0.0, 5.0, record(&log, marker));
        }

        scheduler.fire_due(5.0);
        assert_eq!(*log.borrow(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn zero_and_negative_delay_fire_on_next_call() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(10.0, 0.0, record(&log, "zero"));
        scheduler.schedule(10.0, -4.0, record(&log, "past"));

        assert_eq!(scheduler.fire_due(10.0), 2);
        // Past-due first: execution time 6.0 sorts before 10.0.
        assert_eq!(*log.borrow(), vec!["past", "zero"]);
    }

    #[test]
    fn callback_may_schedule_followup_visited_same_call() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        let handle = scheduler.handle();

        let inner_log = Rc::clone(&log);
        scheduler.schedule(
            0.0,
            1.0,
            Box::new(move || {
                inner_log.borrow_mut().push("outer");
                let follow_log = Rc::clone(&inner_log);
                // Due immediately: visited within the same fire_due call.
                handle.schedule_at(1.0, Box::new(move || follow_log.borrow_mut().push("inner")));
            }),
        );

        assert_eq!(scheduler.fire_due(1.0), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn callback_scheduled_followup_beyond_now_waits() {
        let log = marker_log();
        let mut scheduler = EventScheduler::new();
        let handle = scheduler.handle();

        let inner_log = Rc::clone(&log);
        scheduler.schedule(
            0.0,
            1.0,
            Box::new(move || {
                inner_log.borrow_mut().push("outer");
                let follow_log = Rc::clone(&inner_log);
                handle.schedule(1.0, 0.5, Box::new(move || follow_log.borrow_mut().push("late")));
            }),
        );

        assert_eq!(scheduler.fire_due(1.0), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(scheduler.fire_due(1.5), 1);
        assert_eq!(*log.borrow(), vec!["outer", "late"]);
    }

    #[test]
    fn next_due_peeks_without_popping() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(0.0, 2.0, Box::new(|| {}));
        scheduler.schedule(0.0, 1.0, Box::new(|| {}));

        assert_eq!(scheduler.next_due(), Some(1.0));
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn fire_due_returns_count() {
        let mut scheduler = EventScheduler::new();
        for i in 0..5 {
            scheduler.schedule(0.0, i as f64, Box::new(|| {}));
        }
        assert_eq!(scheduler.fire_due(2.0), 3);
        assert_eq!(scheduler.fire_due(100.0), 2);
    }
}
