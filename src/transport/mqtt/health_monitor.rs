//! Pure connection state transitions for the MQTT session

use super::connection::ConnectionState;
use tracing::{error, info, warn};

/// Link events observed by the event loop task
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    SessionEstablished,
    BrokerClosed,
    NetworkError(String),
    RedialStarted(u32),
    DisconnectRequested,
}

/// Connection state transitions, free of I/O
pub struct HealthMonitor;

impl HealthMonitor {
    /// State the session moves to after `event`
    pub fn next_state(event: LinkEvent) -> ConnectionState {
        match event {
            LinkEvent::SessionEstablished => {
                info!("MQTT session established");
                ConnectionState::Connected
            }
            LinkEvent::BrokerClosed => {
                warn!("MQTT broker closed the session");
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            LinkEvent::NetworkError(reason) => {
                error!("MQTT event loop error: {}", reason);
                ConnectionState::Disconnected(reason)
            }
            LinkEvent::RedialStarted(attempt) => {
                info!("Re-establishing MQTT link, attempt {}", attempt);
                ConnectionState::Reconnecting(attempt)
            }
            LinkEvent::DisconnectRequested => ConnectionState::Disconnecting,
        }
    }

    /// Whether a failed poll in this state is news to a waiting caller
    ///
    /// While re-dialling, every failed attempt would repeat the same loss.
    pub fn reports_link_loss(state: &ConnectionState) -> bool {
        !matches!(state, ConnectionState::Reconnecting(_))
    }

    /// Publishing is gated on `Connected`
    pub fn can_publish(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }
}
