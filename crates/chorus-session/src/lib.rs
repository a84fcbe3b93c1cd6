//! Chorus Session - Top-level session orchestration
//!
//! This crate provides:
//! - The audio device boundary (acquire, enable, release)
//! - `LocalSession`, the per-process session state with its generation
//!   counter
//! - `SessionController`, which sequences join/leave/mute and runs the
//!   reactor loop that composes the reconciler, router, and peer manager

pub mod audio;
pub mod controller;
pub mod local;
pub mod telemetry;

pub use audio::{AudioDevice, AudioSource};
pub use controller::{SessionConfig, SessionController};
pub use local::LocalSession;
