//! Telemetry agent
//!
//! The loop that samples, publishes and displays, and its lifecycle states.

pub mod lifecycle;

pub use lifecycle::*;
