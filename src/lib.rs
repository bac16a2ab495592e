//! Enviro Telemetry - environmental sensor board agent
//!
//! Samples an environmental sensor board at a fixed cadence, publishes each
//! channel as a timestamped JSON message over one persistent mutual-TLS MQTT
//! session, and rotates the latest values across a small status display
//! between publish cycles.
//!
//! # Overview
//!
//! - Key/value configuration loading and validation
//! - Telemetry message types, moisture calibration and topic layout
//! - MQTT transport with QoS 1 publishes acknowledged by the broker
//! - Display page rotation with interruptible holds
//! - Linux IIO sensor board adapter
//! - The telemetry loop tying them together
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use enviro_telemetry::protocol::{build_message, normalize_moisture, Channel, SensorValue};
//!
//! let moisture = normalize_moisture(20.0, 0, 100);
//! assert_eq!(moisture, 80.0);
//!
//! let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let message = build_message("enviro-01", Channel::Moisture, SensorValue::from_f64(moisture), now);
//! let json = String::from_utf8(message.to_payload().unwrap()).unwrap();
//! assert_eq!(
//!     json,
//!     r#"{"client_id":"enviro-01","type":"moisture","data":80.0,"timestamp":1700000000.0}"#
//! );
//! ```

pub mod agent;
pub mod config;
pub mod display;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod sensors;
pub mod testing;
pub mod transport;

pub use agent::{CycleOutcome, LoopState, TelemetryLoop};
pub use config::{ConfigError, TelemetryConfig, TlsCredentials};
pub use error::{TelemetryError, TelemetryResult};
pub use protocol::*;
pub use transport::mqtt::MqttSession;
