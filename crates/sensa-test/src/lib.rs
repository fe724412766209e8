//! Sensa Test Harness - scenario runs and end-to-end checks
//!
//! This crate provides:
//! - `ScenarioBuilder`: wire one or more agents, run them to completion
//! - `ScenarioReport`: traces, captured frames and counters of a run
//! - Property checks over reports (sequence continuity, FIFO order, spacing)

pub mod properties;
pub mod scenario;

pub use properties::*;
pub use scenario::*;
