//! Error types for the telemetry agent
//!
//! Each layer has its own error enum (`ConfigError`, `MqttError`,
//! `RenderError`). `TelemetryError` is what the loop and the binary see.
//! Config and initial connect failures are fatal; a failed publish is logged
//! and the loop carries on. Render failures never leave the rotator.

use crate::config::ConfigError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for telemetry agent operations
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to publish '{payload}' to {topic}: {source}")]
    Publish {
        topic: String,
        payload: String,
        #[source]
        source: BoxError,
    },

    #[error("Disconnect failed: {0}")]
    Disconnect(#[source] BoxError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Create connect error
    pub fn connect<S, E>(endpoint: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connect {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// Create publish error
    pub fn publish<S, P, E>(topic: S, payload: P, source: E) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Publish {
            topic: topic.into(),
            payload: payload.into(),
            source: Box::new(source),
        }
    }

    /// Create disconnect error
    pub fn disconnect<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Disconnect(Box::new(source))
    }

    /// Whether the agent must stop when this error occurs
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Publish { .. })
    }
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
