//! Chorus Test - Harness and scenario tooling
//!
//! In-memory implementations of every collaborator boundary - membership
//! store, signaling relay (with seeded chaos), connectivity factory, audio
//! device - plus a scenario bed that wires them into full session
//! controllers and pumps multi-client meshes deterministically.

pub mod audio;
pub mod bed;
pub mod connectivity;
pub mod membership;
pub mod relay;

#[cfg(test)]
mod integration;

pub use audio::{FakeAudioDevice, SourceProbe};
pub use bed::{settle, TestBed, TestClient, TestController};
pub use connectivity::{FakeConnectivityFactory, SessionProbe};
pub use membership::InMemoryMembership;
pub use relay::{LoopbackRelay, RelayChaos};
