//! Transport layer for telemetry publishing
//!
//! This module provides the transport abstraction the telemetry loop publishes
//! through, and its MQTT implementation.

pub mod mqtt;

/// Broker acknowledgement for one published message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Packet identifier the broker acknowledged
    pub packet_id: u16,
}

/// Transport trait for the telemetry producer
///
/// Abstracts the single outbound broker connection so the loop can be driven
/// by a mock in tests. Implementations deliver at-least-once.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the broker, returning once the session is established
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Publish one payload and wait for the broker's acknowledgement
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishReceipt, Self::Error>;

    /// Close the session. Called exactly once, on shutdown
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Check if transport is connected
    fn is_connected(&self) -> bool;
}
