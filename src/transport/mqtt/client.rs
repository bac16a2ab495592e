//! Impure I/O operations for the MQTT session
//!
//! This module drives the rumqttc event loop in a background task and turns
//! its events into connection state changes and delivery notifications that
//! `publish` and `disconnect` wait on.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError};
use super::health_monitor::{HealthMonitor, LinkEvent};
use super::message_handler::{AbandonedPackets, DeliveryEvent, EventRoute, MessageHandler};
use crate::config::TelemetryConfig;
use crate::mqtt_span;
use crate::transport::{PublishReceipt, Transport};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Upper bound on the initial handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// How long to wait for the DISCONNECT packet to be written
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause before the event loop re-dials after losing an established link
const RECONNECT_DELAY_MS: u64 = 1000;
/// Capacity of the rumqttc request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// State and shutdown channels shared with one event loop task
struct SessionChannels {
    state: (watch::Sender<ConnectionState>, watch::Receiver<ConnectionState>),
    shutdown: (watch::Sender<bool>, watch::Receiver<bool>),
}

impl SessionChannels {
    fn new() -> Self {
        Self {
            state: watch::channel(ConnectionState::Connecting),
            shutdown: watch::channel(false),
        }
    }
}

/// Notifications from the event loop task, read by one caller at a time
struct DeliveryInbox {
    events: mpsc::UnboundedReceiver<DeliveryEvent>,
    abandoned: AbandonedPackets,
}

impl DeliveryInbox {
    fn new(events: mpsc::UnboundedReceiver<DeliveryEvent>) -> Self {
        Self {
            events,
            abandoned: AbandonedPackets::default(),
        }
    }

    /// Drop notifications no caller is waiting for
    fn drain_stale(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.abandoned.observe(&event);
        }
    }

    async fn next(&mut self) -> Option<DeliveryEvent> {
        let event = self.events.recv().await;
        if let Some(event) = &event {
            self.abandoned.observe(event);
        }
        event
    }
}

fn event_loop_stopped() -> MqttError {
    MqttError::LinkLost("Event loop stopped".to_string())
}

/// The single outbound MQTT session of the telemetry agent
pub struct MqttSession {
    client_id: String,
    endpoint: String,
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    event_loop_handle: Option<JoinHandle<()>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    delivery_tx: mpsc::UnboundedSender<DeliveryEvent>,
    inbox: Mutex<DeliveryInbox>,
}

impl MqttSession {
    /// Prepare a session from configuration. Reads the credential files but
    /// does no network I/O.
    pub fn new(config: &TelemetryConfig) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

        Ok(MqttSession {
            client_id: config.client_id.clone(),
            endpoint: config.endpoint.clone(),
            client,
            event_loop: Mutex::new(Some(event_loop)),
            event_loop_handle: None,
            state_rx: None,
            state_tx: None,
            shutdown_tx: None,
            delivery_tx,
            inbox: Mutex::new(DeliveryInbox::new(delivery_rx)),
        })
    }

    /// Resolve once the state reaches `Connected`, or fail on `Disconnected`
    ///
    /// The current state is checked before waiting, so a ConnAck that landed
    /// before the call is not missed.
    async fn await_conn_ack(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let outcome = async {
            loop {
                match &*state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(reason) => {
                        return Err(MqttError::ConnectionFailedStr(reason.clone()))
                    }
                    _ => {}
                }
                state_rx.changed().await.map_err(|_| {
                    MqttError::ConnectionFailedStr("Event loop exited before ConnAck".to_string())
                })?;
            }
        };

        tokio::time::timeout(timeout, outcome).await.map_err(|_| {
            MqttError::ConnectionFailedStr(format!("No ConnAck within {}s", timeout.as_secs()))
        })?
    }

    /// Sleep that returns early (with `false`) when shutdown is signalled
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
            _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
        }
    }

    /// Drive the rumqttc event loop until shutdown
    ///
    /// A failure before the first ConnAck ends the task and fails `connect`.
    /// After that, a lost link is re-dialled by polling again.
    async fn run_event_loop(
        mut event_loop: EventLoop,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
        delivery_tx: mpsc::UnboundedSender<DeliveryEvent>,
        client_id: String,
    ) {
        info!("Starting MQTT event loop for client: {}", client_id);
        let mut established = false;
        let mut reconnect_attempts = 0u32;

        loop {
            tokio::select! {
                // Check for shutdown signal first (higher priority)
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT event loop");
                        break;
                    }
                }

                event_result = event_loop.poll() => {
                    match event_result {
                        Ok(event) => {
                            let route = MessageHandler::route_mqtt_event(&event);
                            match &route {
                                EventRoute::ConnectionAcknowledged => {
                                    established = true;
                                    reconnect_attempts = 0;
                                    let _ = state_tx.send(HealthMonitor::next_state(
                                        LinkEvent::SessionEstablished,
                                    ));
                                }
                                EventRoute::Disconnected => {
                                    let _ = state_tx.send(HealthMonitor::next_state(
                                        LinkEvent::BrokerClosed,
                                    ));
                                }
                                EventRoute::InfrastructureEvent(packet) => {
                                    debug!("MQTT infrastructure event: {}", packet);
                                }
                                _ => {}
                            }
                            if let Some(delivery) = MessageHandler::delivery_event(&route) {
                                let _ = delivery_tx.send(delivery);
                            }
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            if HealthMonitor::reports_link_loss(&state_tx.borrow()) {
                                let _ = delivery_tx.send(DeliveryEvent::LinkLost(reason.clone()));
                            }

                            if !established {
                                let _ = state_tx.send(HealthMonitor::next_state(
                                    LinkEvent::NetworkError(reason),
                                ));
                                break;
                            }
                            if *state_tx.borrow() == ConnectionState::Disconnecting {
                                debug!("Event loop closed during disconnect: {}", reason);
                                break;
                            }

                            error!("MQTT link lost for client {}: {}", client_id, reason);
                            reconnect_attempts += 1;
                            let _ = state_tx.send(HealthMonitor::next_state(
                                LinkEvent::RedialStarted(reconnect_attempts),
                            ));
                            if !Self::interruptible_sleep(shutdown_rx.clone(), RECONNECT_DELAY_MS).await {
                                break;
                            }
                        }
                    }
                }
            }
        }
        info!("MQTT event loop stopped for client: {}", client_id);
    }

    /// Connect to the broker, returning once ConnAck arrives
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self.event_loop.get_mut().take().ok_or_else(|| {
            MqttError::ConnectionFailedStr("Event loop already started".to_string())
        })?;

        let SessionChannels {
            state: (state_tx, state_rx),
            shutdown: (shutdown_tx, shutdown_rx),
        } = SessionChannels::new();
        self.state_tx = Some(state_tx.clone());
        self.state_rx = Some(state_rx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        let span = mqtt_span!(client_id = %self.client_id, endpoint = %self.endpoint);
        let handle = tokio::spawn(
            Self::run_event_loop(
                event_loop,
                state_tx,
                shutdown_rx,
                self.delivery_tx.clone(),
                self.client_id.clone(),
            )
            .instrument(span),
        );
        self.event_loop_handle = Some(handle);

        let confirmed = Self::await_conn_ack(state_rx, CONNECT_TIMEOUT).await;
        if confirmed.is_err() {
            self.stop_event_loop();
        }
        confirmed
    }

    /// Current connection state; `None` before `connect` was called
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Signal the event loop to stop and abort its task without waiting
    fn stop_event_loop(&mut self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }

    /// Publishing is only allowed while `Connected`
    fn ensure_publishable(&self) -> Result<(), MqttError> {
        match self.connection_state() {
            Some(state) if HealthMonitor::can_publish(&state) => Ok(()),
            Some(state) => Err(MqttError::NotConnected { state }),
            None => Err(MqttError::NotConnected {
                state: ConnectionState::Disconnected("connect was never called".to_string()),
            }),
        }
    }

    /// Publish at QoS 1 and wait for the matching PubAck
    ///
    /// If the link drops while waiting, the packet stays with rumqttc and is
    /// written again after the reconnect; this call still reports `LinkLost`.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishReceipt, MqttError> {
        let mut inbox = self.inbox.lock().await;
        // Notifications for earlier, already failed publishes are stale now
        inbox.drain_stale();
        self.ensure_publishable()?;

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        let packet_id = loop {
            match inbox.next().await {
                Some(DeliveryEvent::Sent(packet_id)) => {
                    if !inbox.abandoned.claim_write(packet_id) {
                        break packet_id;
                    }
                    debug!(packet_id, "Earlier publish written again after reconnect");
                }
                Some(DeliveryEvent::LinkLost(reason)) => {
                    inbox.abandoned.abandon_unwritten();
                    return Err(MqttError::LinkLost(reason));
                }
                Some(_) => {}
                None => return Err(event_loop_stopped()),
            }
        };
        debug!(topic = %topic, packet_id, "Publish written, awaiting PubAck");

        loop {
            match inbox.next().await {
                Some(DeliveryEvent::Acked {
                    packet_id: acked,
                    rejection,
                }) if acked == packet_id => {
                    return match rejection {
                        None => Ok(PublishReceipt { packet_id }),
                        Some(reason) => Err(MqttError::PublishRejected { packet_id, reason }),
                    };
                }
                Some(DeliveryEvent::LinkLost(reason)) => {
                    inbox.abandoned.abandon(packet_id);
                    return Err(MqttError::LinkLost(reason));
                }
                Some(_) => {}
                None => return Err(event_loop_stopped()),
            }
        }
    }

    /// Close the session: send DISCONNECT, wait for it to be flushed, then
    /// stop the event loop task
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        let Some(state_tx) = self.state_tx.clone() else {
            info!("MQTT session was never connected, nothing to close");
            return Ok(());
        };
        let _ = state_tx.send(HealthMonitor::next_state(
            LinkEvent::DisconnectRequested,
        ));

        {
            let mut inbox = self.inbox.lock().await;
            inbox.drain_stale();
            self.client
                .disconnect()
                .await
                .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

            let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
                loop {
                    match inbox.next().await {
                        Some(DeliveryEvent::DisconnectSent) => return true,
                        Some(DeliveryEvent::LinkLost(_)) | None => return false,
                        Some(_) => continue,
                    }
                }
            })
            .await;

            match flushed {
                Ok(true) => debug!("DISCONNECT flushed to broker"),
                Ok(false) => warn!("MQTT link closed before DISCONNECT was flushed"),
                Err(_) => warn!("Timed out waiting for DISCONNECT to be flushed"),
            }
        }

        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        if let Some(handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => info!("Event loop task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => warn!("Event loop task ended with error: {}", e),
                Err(_) => warn!("Event loop task didn't shut down gracefully, forcing abort"),
                _ => {}
            }
        }

        let _ = state_tx.send(ConnectionState::Disconnected(
            "Client disconnected".to_string(),
        ));
        info!("MQTT session closed");
        Ok(())
    }
}

#[async_trait]
impl Transport for MqttSession {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttSession::connect(self).await
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishReceipt, Self::Error> {
        MqttSession::publish(self, topic, payload).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttSession::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        // No async disconnect here; callers disconnect explicitly
        self.stop_event_loop();
    }
}
