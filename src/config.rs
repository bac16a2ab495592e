//! Operating configuration for the telemetry agent
//!
//! The configuration file is a plain text list of `name = value` lines. The
//! value is everything after the first `=` on the line, trimmed. Lines without
//! `=` are ignored. Nine options are required; everything else is optional.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Options that must be present before the agent may start, in reporting order
pub const REQUIRED_OPTIONS: [&str; 9] = [
    "aws_iot_endpoint",
    "client_id",
    "certificate_path",
    "private_key_path",
    "root_ca_path",
    "parent_topic",
    "update_frequency",
    "moisture_min",
    "moisture_max",
];

/// Footer shown on the last display page when `display_footer` is not set
pub const DEFAULT_DISPLAY_FOOTER: &str = "iot.benfreke.org";

/// Largest keep-alive MQTT can carry (the field is a u16 of seconds)
const MAX_KEEP_ALIVE_SECS: u64 = u16::MAX as u64;

/// Immutable agent configuration, built once at startup
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TelemetryConfig {
    /// Broker endpoint, `host` or `host:port`
    pub endpoint: String,
    /// Client identity used for the MQTT session and in every message
    pub client_id: String,
    /// Prefix concatenated with the channel name to form a topic
    pub parent_topic: String,
    /// Seconds between samples
    pub update_frequency: u64,
    /// Raw moisture reading that maps to 100%
    pub moisture_min: i64,
    /// Raw moisture reading that maps to 0%
    pub moisture_max: i64,
    /// Static text on the last display page
    pub display_footer: String,
    /// Mutual TLS material
    pub credentials: TlsCredentials,
}

/// Paths to the three transport credential artifacts
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TlsCredentials {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub root_ca_path: PathBuf,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Options are missing from config: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidType {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid<S: Into<String>>(field: &str, value: &str, reason: S) -> Self {
        Self::InvalidType {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Split config text into its `name = value` options
///
/// Later occurrences of a name replace earlier ones.
pub fn parse_options(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

impl TelemetryConfig {
    /// Load and validate configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_options_str(&content)
    }

    /// Build configuration from config file text
    pub fn from_options_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_options(&parse_options(content))
    }

    /// Build configuration from already parsed options
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let missing: Vec<String> = REQUIRED_OPTIONS
            .iter()
            .filter(|name| !options.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        // Every required key is present past this point
        let get = |name: &str| options.get(name).cloned().unwrap_or_default();

        let update_frequency = parse_integer::<u64>(options, "update_frequency")?;
        if update_frequency == 0 {
            return Err(ConfigError::invalid(
                "update_frequency",
                "0",
                "must be greater than zero",
            ));
        }
        if update_frequency < 3 {
            warn!(
                update_frequency,
                "update_frequency below 3 seconds gives zero-length display holds"
            );
        }

        let moisture_min = parse_integer::<i64>(options, "moisture_min")?;
        let moisture_max = parse_integer::<i64>(options, "moisture_max")?;
        if moisture_min == moisture_max {
            return Err(ConfigError::invalid(
                "moisture_max",
                &moisture_max.to_string(),
                "must differ from moisture_min",
            ));
        }

        Ok(Self {
            endpoint: get("aws_iot_endpoint"),
            client_id: get("client_id"),
            parent_topic: get("parent_topic"),
            update_frequency,
            moisture_min,
            moisture_max,
            display_footer: options
                .get("display_footer")
                .cloned()
                .unwrap_or_else(|| DEFAULT_DISPLAY_FOOTER.to_string()),
            credentials: TlsCredentials {
                certificate_path: PathBuf::from(get("certificate_path")),
                private_key_path: PathBuf::from(get("private_key_path")),
                root_ca_path: PathBuf::from(get("root_ca_path")),
            },
        })
    }

    /// MQTT keep-alive: ten update periods, so pings stay rare next to telemetry
    pub fn keep_alive(&self) -> Duration {
        let secs = self.update_frequency.saturating_mul(10);
        if secs > MAX_KEEP_ALIVE_SECS {
            warn!(
                requested_secs = secs,
                "Keep-alive exceeds the MQTT maximum, clamping to {MAX_KEEP_ALIVE_SECS}s"
            );
        }
        Duration::from_secs(secs.min(MAX_KEEP_ALIVE_SECS))
    }

    /// Hold time for each of the three display pages
    pub fn slice_period(&self) -> Duration {
        Duration::from_secs(self.update_frequency / 3)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self::from_options_str(
            r#"
aws_iot_endpoint = example-ats.iot.eu-west-1.amazonaws.com
client_id = enviro-test
certificate_path = /etc/enviro/device.pem.crt
private_key_path = /etc/enviro/private.pem.key
root_ca_path = /etc/enviro/AmazonRootCA1.pem
parent_topic = enviro/
update_frequency = 10
moisture_min = 0
moisture_max = 100
"#,
        )
        .expect("Test config should parse")
    }
}

fn parse_integer<N>(options: &BTreeMap<String, String>, field: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    let value = options.get(field).map(String::as_str).unwrap_or_default();
    value
        .parse::<N>()
        .map_err(|e| ConfigError::invalid(field, value, format!("expected an integer: {e}")))
}
