//! Testing utilities and mock implementations
//!
//! Mocks for the transport, sensor board and display so the telemetry loop
//! can be exercised without a broker or hardware.

pub mod mocks;

pub use mocks::*;
