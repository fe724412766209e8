//! Sensa Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every Sensa crate:
//! - Identifiers (NodeId, ClusterId, NodeIdentity)
//! - Simulated time (SimTime)
//! - Error taxonomy (SensaError)

pub mod error;
pub mod id;
pub mod time;

pub use error::*;
pub use id::*;
pub use time::*;
