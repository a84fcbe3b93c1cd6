//! Chorus Peer - Peer connection lifecycle
//!
//! This crate provides:
//! - The connectivity session boundary (WebRTC-equivalent offer/answer/
//!   candidate primitives)
//! - The per-remote `PeerLink` negotiation state machine
//! - The lifecycle manager that owns one link per remote participant and
//!   guards against duplicate, late, and stale negotiation traffic

pub mod connectivity;
pub mod link;
pub mod manager;

pub use connectivity::{ConnectivityConfig, ConnectivityFactory, ConnectivitySession};
pub use link::{LinkRole, LinkState, PeerLink};
pub use manager::{LinkUpdate, PeerLifecycleManager};
