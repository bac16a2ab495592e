//! MQTT session for the telemetry producer
//!
//! The session owns one mutually-authenticated connection to the broker.
//! Pure pieces are kept apart from the I/O so they can be tested alone:
//!
//! - [`connection`] - Connection state, errors and client options
//! - [`message_handler`] - Routing of raw MQTT events to delivery notifications
//! - [`health_monitor`] - Connection state transitions
//! - [`client`] - The network event loop and the publish/ack handshake
//!
//! # Usage
//!
//! ```rust,no_run
//! use enviro_telemetry::config::TelemetryConfig;
//! use enviro_telemetry::transport::mqtt::MqttSession;
//! use std::path::Path;
//!
//! # tokio_test::block_on(async {
//! let config = TelemetryConfig::load_from_file(Path::new("sensor_config.txt"))?;
//!
//! let mut session = MqttSession::new(&config)?;
//! session.connect().await?;
//! session.publish("enviro/temperature", b"{}".to_vec()).await?;
//! session.disconnect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

// Re-export public types for convenience
pub use client::MqttSession;
pub use connection::{configure_mqtt_options, parse_endpoint, ConnectionState, MqttError};
pub use health_monitor::{HealthMonitor, LinkEvent};
pub use message_handler::{DeliveryEvent, EventRoute, MessageHandler};
