//! Telemetry wire protocol
//!
//! Message types published for every sensor channel, the codec that derives
//! published values from raw readings, and topic construction.

pub mod codec;
pub mod messages;
pub mod topics;

pub use codec::*;
pub use messages::*;
pub use topics::*;
