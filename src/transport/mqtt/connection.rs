//! Pure connection state management for the MQTT session
//!
//! This module contains connection state, the session error type, and the
//! construction of client options from the agent configuration.

use crate::config::{TelemetryConfig, TlsCredentials};
use rumqttc::v5::mqttbytes::v5::ConnectProperties;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Port used when the endpoint does not name one
pub const DEFAULT_MQTTS_PORT: u16 = 8883;

/// How long the broker keeps the persistent session after the link drops
pub const SESSION_EXPIRY_SECS: u32 = 3600;

/// Connection state for the MQTT session
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - waiting for ConnAck
    Connecting,
    /// Connected and ready for publishing
    Connected,
    /// Link lost, the event loop is re-establishing it (attempt count)
    Reconnecting(u32),
    /// Orderly shutdown has begun; no further publishes are accepted
    Disconnecting,
    /// Disconnected with reason
    Disconnected(String),
}

/// MQTT session errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection failed: {0}")]
    ConnectionFailedStr(String),
    #[error("Invalid broker endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Failed to read credential {path}: {source}")]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Broker rejected packet {packet_id}: {reason}")]
    PublishRejected { packet_id: u16, reason: String },
    #[error("Connection lost before acknowledgement: {0}")]
    LinkLost(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
}

/// Split an endpoint (`host`, `host:port` or `mqtts://host:port`) into host and port
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), MqttError> {
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("mqtts://{endpoint}")
    };
    let url = Url::parse(&candidate).map_err(|_| MqttError::InvalidEndpoint(endpoint.to_string()))?;
    if url.scheme() != "mqtts" {
        return Err(MqttError::InvalidEndpoint(format!(
            "{endpoint} (only mqtts is supported)"
        )));
    }

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| MqttError::InvalidEndpoint(endpoint.to_string()))?;
    let port = url.port().unwrap_or(DEFAULT_MQTTS_PORT);
    Ok((host.to_string(), port))
}

fn read_credential(path: &Path) -> Result<Vec<u8>, MqttError> {
    std::fs::read(path).map_err(|source| MqttError::CredentialRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the mutual TLS transport from the three credential files
pub fn tls_transport(credentials: &TlsCredentials) -> Result<RumqttcTransport, MqttError> {
    let ca = read_credential(&credentials.root_ca_path)?;
    let certificate = read_credential(&credentials.certificate_path)?;
    let private_key = read_credential(&credentials.private_key_path)?;
    Ok(RumqttcTransport::tls(ca, Some((certificate, private_key)), None))
}

/// CONNECT properties that keep the session alive across a dropped link
///
/// Without an expiry interval an MQTT 5 broker discards the session as soon
/// as the network connection closes, even with `clean_start = false`.
fn persistent_session_properties() -> ConnectProperties {
    let mut properties = ConnectProperties::new();
    properties.session_expiry_interval = Some(SESSION_EXPIRY_SECS);
    properties
}

/// Pure function to configure MQTT options from config
///
/// The client ID is the configured identity, unchanged, so the broker can
/// resume the persistent session after a reconnect.
pub fn configure_mqtt_options(config: &TelemetryConfig) -> Result<MqttOptions, MqttError> {
    let (host, port) = parse_endpoint(&config.endpoint)?;
    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), host, port);

    mqtt_options.set_transport(tls_transport(&config.credentials)?);
    mqtt_options.set_keep_alive(config.keep_alive());
    mqtt_options.set_clean_start(false);
    mqtt_options.set_connect_properties(persistent_session_properties());

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_with_credentials(dir: &TempDir) -> TelemetryConfig {
        for name in ["device.pem.crt", "private.pem.key", "root-ca.pem"] {
            std::fs::write(dir.path().join(name), b"-----BEGIN TEST-----\n").unwrap();
        }
        let mut config = TelemetryConfig::test_config();
        config.credentials = TlsCredentials {
            certificate_path: dir.path().join("device.pem.crt"),
            private_key_path: dir.path().join("private.pem.key"),
            root_ca_path: dir.path().join("root-ca.pem"),
        };
        config
    }

    #[test]
    fn test_parse_endpoint_defaults_port() {
        assert_eq!(
            parse_endpoint("abc-ats.iot.us-east-1.amazonaws.com").unwrap(),
            ("abc-ats.iot.us-east-1.amazonaws.com".to_string(), 8883)
        );
    }

    #[test]
    fn test_parse_endpoint_with_port_and_scheme() {
        assert_eq!(
            parse_endpoint("broker.local:443").unwrap(),
            ("broker.local".to_string(), 443)
        );
        assert_eq!(
            parse_endpoint("mqtts://broker.local:9883").unwrap(),
            ("broker.local".to_string(), 9883)
        );
    }

    #[test]
    fn test_parse_endpoint_rejects_plaintext_and_garbage() {
        assert!(matches!(
            parse_endpoint("mqtt://broker.local:1883"),
            Err(MqttError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            parse_endpoint(""),
            Err(MqttError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_configure_mqtt_options() {
        let dir = TempDir::new().unwrap();
        let config = config_with_credentials(&dir);

        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.client_id(), "enviro-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(100));
        assert!(!options.clean_start());
        let properties = options
            .connect_properties()
            .expect("persistent session needs CONNECT properties");
        assert_eq!(properties.session_expiry_interval, Some(SESSION_EXPIRY_SECS));
        assert_eq!(SESSION_EXPIRY_SECS, 3600);
        assert_eq!(
            options.broker_address(),
            (
                "example-ats.iot.eu-west-1.amazonaws.com".to_string(),
                DEFAULT_MQTTS_PORT
            )
        );
    }

    #[test]
    fn test_missing_credential_is_reported_with_path() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_credentials(&dir);
        config.credentials.private_key_path = dir.path().join("absent.key");

        match configure_mqtt_options(&config) {
            Err(MqttError::CredentialRead { path, .. }) => {
                assert_eq!(path, dir.path().join("absent.key"));
            }
            other => panic!("Expected CredentialRead, got {other:?}"),
        }
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(ConnectionState::Connected, ConnectionState::Disconnecting);
        assert_eq!(
            ConnectionState::Disconnected("test".to_string()),
            ConnectionState::Disconnected("test".to_string())
        );
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailed("test".to_string().into()),
            MqttError::ConnectionFailedStr("test".to_string()),
            MqttError::InvalidEndpoint("test".to_string()),
            MqttError::PublishFailed("test".to_string().into()),
            MqttError::PublishRejected {
                packet_id: 3,
                reason: "NotAuthorized".to_string(),
            },
            MqttError::LinkLost("reset".to_string()),
            MqttError::NotConnected {
                state: ConnectionState::Disconnecting,
            },
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
