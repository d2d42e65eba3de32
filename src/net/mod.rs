//! UDP transport adapters
//!
//! The transport carries whole wire records as best-effort datagrams.
//! Records may be lost, reordered, or duplicated; the orderer downstream
//! absorbs all three.

pub mod udp;

pub use udp::{TransportStats, WireReceiver, WireSender};
