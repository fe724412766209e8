//! Sensa Runtime - the sensing agent and its simulation driver
//!
//! One agent runs three timer chains on a discrete-event substrate:
//! 1. Measurement ticks: read a block, add noise, compress, packetize
//! 2. Scheduling attempts: pop the queue head and roll the transmission gate
//! 3. Sends: emit the admitted packet on every device of the node
//!
//! At most one send is in flight at any instant.

pub mod agent;
pub mod broadcast;
pub mod config;
pub mod draws;
pub mod measurement;
pub mod packetizer;
pub mod sim;
pub mod sink;
pub mod trace;

pub use agent::*;
pub use broadcast::*;
pub use config::*;
pub use draws::*;
pub use measurement::*;
pub use packetizer::*;
pub use sim::*;
pub use sink::*;
pub use trace::*;
