//! Mock implementations for testing
//!
//! `MockTransport` records every call it receives, `MockSensorBoard` returns
//! fixed channel values and `MockDisplay` records painted frames.

use crate::display::{Canvas, DisplaySurface, Fill, Point, RenderError};
use crate::sensors::SensorBoard;
use crate::transport::{PublishReceipt, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

pub type PublishedMessage = (String, Vec<u8>);

/// One call made on a [`MockTransport`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

/// Failures a [`MockTransport`] can be told to produce
#[derive(Debug, Error)]
pub enum MockTransportError {
    #[error("Mock connection failure")]
    ConnectRefused,
    #[error("Mock publish failure")]
    PublishFailed,
    #[error("Mock disconnect failure")]
    DisconnectFailed,
    #[error("Publish attempted while not connected")]
    NotConnected,
}

/// Mock transport for testing
#[derive(Debug, Default)]
pub struct MockTransport {
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    pub fail_connect: bool,
    pub fail_publish: bool,
    pub fail_disconnect: bool,
    connected: AtomicBool,
    next_packet_id: AtomicU16,
    successful_publishes: AtomicUsize,
    shutdown_after: Option<(usize, watch::Sender<bool>)>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_failure() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    pub fn with_publish_failure() -> Self {
        Self {
            fail_publish: true,
            ..Default::default()
        }
    }

    pub fn with_disconnect_failure() -> Self {
        Self {
            fail_disconnect: true,
            ..Default::default()
        }
    }

    /// Request shutdown once `publishes` messages have been acknowledged
    pub fn with_shutdown_after(mut self, publishes: usize, shutdown: watch::Sender<bool>) -> Self {
        self.shutdown_after = Some((publishes, shutdown));
        self
    }

    pub async fn get_calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::Publish { topic, payload } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn count(&self, wanted: fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().await.iter().filter(|call| wanted(call)).count()
    }

    pub async fn clear_history(&self) {
        self.calls.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.calls.lock().await.push(TransportCall::Connect);
        if self.fail_connect {
            return Err(MockTransportError::ConnectRefused);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishReceipt, Self::Error> {
        self.calls.lock().await.push(TransportCall::Publish {
            topic: topic.to_string(),
            payload,
        });
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MockTransportError::NotConnected);
        }
        if self.fail_publish {
            return Err(MockTransportError::PublishFailed);
        }

        let packet_id = self.next_packet_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let published = self.successful_publishes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, shutdown)) = &self.shutdown_after {
            if published >= *limit {
                let _ = shutdown.send(true);
            }
        }
        Ok(PublishReceipt { packet_id })
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.calls.lock().await.push(TransportCall::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(MockTransportError::DisconnectFailed);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Sensor board returning fixed values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MockSensorBoard {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ambient_light: Option<f64>,
    pub pressure: Option<f64>,
    pub grove_analog: Option<f64>,
}

impl MockSensorBoard {
    /// The reference reading: 21.5 C, 45 %, 300 lux, 101.3 kPa, raw moisture 20
    pub fn sample() -> Self {
        Self {
            temperature: Some(21.5),
            humidity: Some(45.0),
            ambient_light: Some(300.0),
            pressure: Some(101.3),
            grove_analog: Some(20.0),
        }
    }

    /// A board where no channel can be read
    pub fn empty() -> Self {
        Self::default()
    }
}

impl SensorBoard for MockSensorBoard {
    fn temperature(&mut self) -> Option<f64> {
        self.temperature
    }
    fn humidity(&mut self) -> Option<f64> {
        self.humidity
    }
    fn ambient_light(&mut self) -> Option<f64> {
        self.ambient_light
    }
    fn pressure(&mut self) -> Option<f64> {
        self.pressure
    }
    fn grove_analog(&mut self) -> Option<f64> {
        self.grove_analog
    }
}

/// Text drawn on a [`MockDisplay`] during one paint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub origin: Point,
    pub text: String,
    pub fill: Fill,
}

#[derive(Default)]
struct RecordingCanvas {
    frames: Vec<Frame>,
}

impl Canvas for RecordingCanvas {
    fn text(&mut self, origin: Point, text: &str, fill: Fill) {
        self.frames.push(Frame {
            origin,
            text: text.to_string(),
            fill,
        });
    }
}

/// Display that records frames; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct MockDisplay {
    frames: Arc<std::sync::Mutex<Vec<Frame>>>,
    paint_attempts: Arc<AtomicUsize>,
    pub unavailable: bool,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A display whose every paint fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn paint_attempts(&self) -> usize {
        self.paint_attempts.load(Ordering::SeqCst)
    }
}

impl DisplaySurface for MockDisplay {
    fn paint(&mut self, draw: &mut dyn FnMut(&mut dyn Canvas)) -> Result<(), RenderError> {
        self.paint_attempts.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RenderError::DisplayUnavailable("mock display offline".to_string()));
        }
        let mut canvas = RecordingCanvas::default();
        draw(&mut canvas);
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(canvas.frames);
        Ok(())
    }
}
