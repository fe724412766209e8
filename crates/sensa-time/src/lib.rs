//! Sensa Time - discrete-event timer substrate
//!
//! All agent work happens as callbacks fired at logical timestamps:
//! - `TimerQueue`: the schedule / cancel / is-pending contract
//! - `EventScheduler`: deterministic queue ordered by (time, priority, insertion order)
//! - `EventPriority`: same-instant ordering, acquisition before dispatch

pub mod scheduler;
pub mod timer;

pub use scheduler::*;
pub use timer::*;
