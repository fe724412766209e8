//! Timer handles and the scheduling contract.

use std::fmt;
use std::time::Duration;

use sensa_core::SimTime;

/// Opaque handle to a scheduled one-shot timer.
///
/// Handles are never reused, so a stale handle can always be told apart
/// from the timer currently armed for the same chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub(crate) u64);

impl TimerHandle {
    /// Raw handle value (useful in logs)
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timer#{}", self.0)
    }
}

/// Priority levels for event ordering within the same timestamp.
///
/// Lower values are processed first. Everything a tick produces must be in
/// place before anything consumes it at that same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Start / stop of a node
    Lifecycle = 0,
    /// Data acquisition: measurement, packetization, queue append
    Acquisition = 1,
    /// Work that drains what acquisition produced: attempts and sends
    Dispatch = 2,
}

/// Events that know their same-instant priority
pub trait Prioritized {
    fn priority(&self) -> EventPriority;
}

/// Abstraction for scheduling and cancelling one-shot timers.
///
/// Agent logic only talks to this trait. The simulation driver implements
/// it on top of [`EventScheduler`](crate::EventScheduler); tests may wrap it
/// to observe what gets armed.
pub trait TimerQueue<E> {
    /// Current logical time
    fn now(&self) -> SimTime;

    /// Arm a one-shot timer firing `event` after `delay`
    fn schedule(&mut self, delay: Duration, event: E) -> TimerHandle;

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Whether the timer is still waiting to fire
    fn is_pending(&self, handle: TimerHandle) -> bool;
}

/// A timer popped from the queue
#[derive(Clone, Debug, PartialEq)]
pub struct FiredTimer<E> {
    pub at: SimTime,
    pub handle: TimerHandle,
    pub event: E,
}
