//! Chorus Signal - Signaling transport
//!
//! This crate provides:
//! - The signaling relay boundary (topic pub/sub, at-least-once,
//!   per-sender ordering)
//! - The router that addresses outbound negotiation messages and
//!   demultiplexes inbound ones

pub mod relay;
pub mod router;

pub use relay::SignalingRelay;
pub use router::SignalingRouter;
