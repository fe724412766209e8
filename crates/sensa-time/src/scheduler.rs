//! Event scheduler with deterministic ordering.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use sensa_core::SimTime;
use tracing::trace;

use crate::{EventPriority, FiredTimer, Prioritized, TimerHandle, TimerQueue};

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (lifecycle before acquisition before dispatch)
/// 3. Sequence number (FIFO for the same time and priority)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event should fire.
    pub time: SimTime,
    /// Priority for ordering at the same time.
    pub priority: EventPriority,
    /// Insertion sequence, doubles as the timer handle.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }

        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deterministic discrete-event scheduler.
///
/// Single-threaded: callers pop one event at a time and handle it to
/// completion before popping the next. Events due at the same instant fire
/// in [`EventPriority`] order; within one priority, anything scheduled with
/// zero delay while handling an event at `t` fires after every event
/// already queued for `t`.
pub struct EventScheduler<E> {
    /// Pending events in firing order.
    queue: BTreeMap<EventKey, E>,
    /// Handle -> key for cancellation.
    pending: HashMap<TimerHandle, EventKey>,
    /// Current logical time.
    now: SimTime,
    /// Sequence counter for deterministic ordering.
    sequence: u64,
    /// Total events fired.
    fired: u64,
}

impl<E> EventScheduler<E> {
    pub fn new() -> Self {
        EventScheduler {
            queue: BTreeMap::new(),
            pending: HashMap::new(),
            now: SimTime::ZERO,
            sequence: 0,
            fired: 0,
        }
    }

    /// Pop the next event, advancing the clock to its timestamp
    pub fn pop_next(&mut self) -> Option<FiredTimer<E>> {
        let (key, event) = self.queue.pop_first()?;
        let handle = TimerHandle(key.sequence);
        self.pending.remove(&handle);
        self.now = key.time;
        self.fired += 1;
        Some(FiredTimer {
            at: key.time,
            handle,
            event,
        })
    }

    /// Time of the next pending event
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.first_key_value().map(|(key, _)| key.time)
    }

    /// Advance the clock without firing anything (never moves backwards)
    pub fn advance_to(&mut self, time: SimTime) {
        self.now = self.now.max(time);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total events fired so far
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl<E: Prioritized> EventScheduler<E> {
    /// Schedule at an absolute time. Times in the past fire at `now`.
    pub fn schedule_at(&mut self, time: SimTime, event: E) -> TimerHandle {
        self.sequence += 1;
        let key = EventKey {
            time: time.max(self.now),
            priority: event.priority(),
            sequence: self.sequence,
        };
        let handle = TimerHandle(self.sequence);
        self.queue.insert(key, event);
        self.pending.insert(handle, key);
        trace!(handle = handle.raw(), at = %key.time, priority = ?key.priority, "Timer armed");
        handle
    }
}

impl<E> Default for EventScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Prioritized> TimerQueue<E> for EventScheduler<E> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule(&mut self, delay: Duration, event: E) -> TimerHandle {
        let at = self.now + delay;
        self.schedule_at(at, event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.pending.remove(&handle) {
            Some(key) => {
                self.queue.remove(&key);
                trace!(handle = handle.raw(), "Timer cancelled");
                true
            }
            None => false,
        }
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }
}
