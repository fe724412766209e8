//! Sensa Wire Protocol - Binary packet format
//!
//! A broadcast packet is:
//! - Fixed header (18 bytes)
//! - Payload: one compressed block as consecutive little-endian f64 values
//!
//! There is no fragmentation: one compressed block always maps to exactly
//! one packet.

pub mod header;
pub mod packet;

pub use header::*;
pub use packet::*;
