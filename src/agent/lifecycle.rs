//! Telemetry loop lifecycle
//!
//! `Idle -> Connecting -> Running -> Disconnecting -> Terminated`. The loop is
//! the only driver: each cycle samples the board, publishes one message per
//! channel, then hands the reading to the display rotator, whose three holds
//! set the cadence. Shutdown is observed at the top of a cycle, between the
//! publishes and the display, and during display holds.

use crate::config::TelemetryConfig;
use crate::display::{DisplayRotator, DisplaySurface};
use crate::error::{TelemetryError, TelemetryResult};
use crate::protocol::{
    build_message, channel_topic, derive_value, Channel, MoistureCalibration, Reading,
    SensorValue, TelemetryMessage,
};
use crate::sensors::SensorBoard;
use crate::transport::{PublishReceipt, Transport};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, Instrument};

/// Where the loop is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Connecting,
    Running,
    Disconnecting,
    Terminated,
}

/// Result of sampling and publishing one reading
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub reading: Reading,
    /// Calibrated moisture percentage, as published
    pub moisture: SensorValue,
    /// Messages the broker acknowledged
    pub published: usize,
    /// Messages that failed and were dropped
    pub failed: usize,
}

/// The sample, publish, display loop with its collaborators injected
pub struct TelemetryLoop<T, S, D>
where
    T: Transport,
    S: SensorBoard,
    D: DisplaySurface,
{
    config: TelemetryConfig,
    transport: T,
    sensors: S,
    rotator: DisplayRotator<D>,
    state: LoopState,
    cycles_completed: u64,
}

impl<T, S, D> TelemetryLoop<T, S, D>
where
    T: Transport,
    S: SensorBoard,
    D: DisplaySurface,
{
    pub fn new(config: TelemetryConfig, transport: T, sensors: S, display: D) -> Self {
        let rotator = DisplayRotator::new(display, config.display_footer.clone());
        Self {
            config,
            transport,
            sensors,
            rotator,
            state: LoopState::Idle,
            cycles_completed: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Get the transport instance for testing
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Cycles that ran through publish and display
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    fn calibration(&self) -> MoistureCalibration {
        MoistureCalibration {
            min: self.config.moisture_min,
            max: self.config.moisture_max,
        }
    }

    /// Sample the board once and publish every channel, in order
    ///
    /// A failed publish is logged and skipped; nothing is retried.
    pub async fn collect_once(&mut self) -> CycleOutcome {
        let reading = Reading::sample(&mut self.sensors);
        let calibration = self.calibration();
        let moisture = calibration.normalize(reading.raw_moisture);
        debug!(?reading, moisture = moisture.as_f64(), "Sampled sensor board");

        let now = Utc::now();
        let mut outcome = CycleOutcome {
            reading,
            moisture,
            published: 0,
            failed: 0,
        };

        for channel in Channel::ALL {
            let value = derive_value(&reading, channel, calibration);
            let message = build_message(&self.config.client_id, channel, value, now);
            match self.publish_message(&message).await {
                Ok(_) => outcome.published += 1,
                Err(e) => {
                    outcome.failed += 1;
                    error!(channel = %channel, error = %e, "Publish failed, not retried");
                }
            }
        }

        outcome
    }

    async fn publish_message(&self, message: &TelemetryMessage) -> TelemetryResult<PublishReceipt> {
        let topic = channel_topic(&self.config.parent_topic, message.message_type);
        let payload = message.to_payload()?;
        let rendered = String::from_utf8_lossy(&payload).into_owned();

        match self.transport.publish(&topic, payload).await {
            Ok(receipt) => {
                info!(
                    topic = %topic,
                    payload = %rendered,
                    packet_id = receipt.packet_id,
                    "Published: '{}' to the topic: {}",
                    rendered,
                    topic
                );
                Ok(receipt)
            }
            Err(e) => Err(TelemetryError::publish(topic, rendered, e)),
        }
    }

    /// Connect, cycle until shutdown, then disconnect exactly once
    ///
    /// A connect failure terminates without sampling. The returned error on
    /// the shutdown path is the disconnect failure, if any.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> TelemetryResult<()> {
        self.state = LoopState::Connecting;
        info!(
            "Connecting to {} with client ID '{}'...",
            self.config.endpoint, self.config.client_id
        );
        if let Err(e) = self.transport.connect().await {
            self.state = LoopState::Terminated;
            error!(endpoint = %self.config.endpoint, error = %e, "Connection failed");
            return Err(TelemetryError::connect(self.config.endpoint.clone(), e));
        }
        info!("Connected!");
        self.state = LoopState::Running;

        let slice = self.config.slice_period();
        loop {
            if *shutdown.borrow() {
                break;
            }

            let span = crate::cycle_span!(cycle = self.cycles_completed + 1);
            let outcome = self.collect_once().instrument(span.clone()).await;

            if *shutdown.borrow() {
                break;
            }

            let report = self
                .rotator
                .rotate(&outcome.reading, outcome.moisture, slice, &mut shutdown)
                .instrument(span)
                .await;
            self.cycles_completed += 1;
            if report.interrupted {
                break;
            }
        }

        self.shutdown().await
    }

    async fn shutdown(&mut self) -> TelemetryResult<()> {
        self.state = LoopState::Disconnecting;
        info!(connected = self.transport.is_connected(), "Disconnecting...");
        let result = self
            .transport
            .disconnect()
            .await
            .map_err(TelemetryError::disconnect);
        self.state = LoopState::Terminated;
        match &result {
            Ok(()) => info!(cycles = self.cycles_completed, "Telemetry loop stopped"),
            Err(e) => error!(error = %e, "Disconnect failed"),
        }
        result
    }
}
