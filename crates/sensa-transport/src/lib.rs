//! Sensa Transport Layer - address-less broadcast
//!
//! This crate provides:
//! - `NetDevice`: one outbound link of a node
//! - `Transmitter`: emits a packet on every device of a node
//! - `CaptureDevice`: in-memory device for simulation and tests
//! - `UdpBroadcastDevice`: UDP broadcast link

pub mod capture;
pub mod device;
pub mod udp;

pub use capture::*;
pub use device::*;
pub use udp::*;
