//! Telemetry message types
//!
//! A [`Reading`] is one snapshot of the five board channels. Each channel is
//! published on its own as a [`TelemetryMessage`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sensor channels published by the agent, in publish order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Humidity,
    Light,
    Pressure,
    Moisture,
}

impl Channel {
    /// Every channel, in the deterministic order messages are published
    pub const ALL: [Channel; 5] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Light,
        Channel::Pressure,
        Channel::Moisture,
    ];

    /// Wire name used for the message `type` field and topic suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Light => "light",
            Channel::Pressure => "pressure",
            Channel::Moisture => "moisture",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sensor value, or the marker for a sensor that gave no reading
///
/// On the wire an absent value is JSON `null`; a `null` parses back to
/// [`SensorValue::Absent`]. NaN is never constructed as `Present`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SensorValue {
    Present(f64),
    #[default]
    Absent,
}

impl SensorValue {
    /// Wrap a raw float, treating NaN as a missing reading
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            SensorValue::Absent
        } else {
            SensorValue::Present(value)
        }
    }

    /// Float view of the value; absent values become NaN
    pub fn as_f64(&self) -> f64 {
        match self {
            SensorValue::Present(value) => *value,
            SensorValue::Absent => f64::NAN,
        }
    }

    /// Apply `f` to a present value; absent stays absent
    pub fn map<F: FnOnce(f64) -> f64>(self, f: F) -> Self {
        match self {
            SensorValue::Present(value) => SensorValue::from_f64(f(value)),
            SensorValue::Absent => SensorValue::Absent,
        }
    }
}

impl From<Option<f64>> for SensorValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(SensorValue::Absent, SensorValue::from_f64)
    }
}

impl Serialize for SensorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SensorValue::Present(value) if value.is_finite() => serializer.serialize_f64(*value),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for SensorValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.into())
    }
}

/// One snapshot of every board channel, captured in the same cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub temperature: SensorValue,
    pub humidity: SensorValue,
    pub light: SensorValue,
    pub pressure: SensorValue,
    /// Uncalibrated ADC value from the moisture probe
    pub raw_moisture: SensorValue,
}

impl Reading {
    /// Raw value captured for a channel (moisture is uncalibrated)
    pub fn raw(&self, channel: Channel) -> SensorValue {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Light => self.light,
            Channel::Pressure => self.pressure,
            Channel::Moisture => self.raw_moisture,
        }
    }
}

/// Wire message for a single channel
///
/// # Examples
/// ```
/// use enviro_telemetry::protocol::{Channel, SensorValue, TelemetryMessage};
///
/// let message = TelemetryMessage {
///     client_id: "garden-node".to_string(),
///     message_type: Channel::Humidity,
///     data: SensorValue::Present(45.0),
///     timestamp: 1_700_000_000.25,
/// };
/// let json = serde_json::to_string(&message).unwrap();
/// assert_eq!(
///     json,
///     r#"{"client_id":"garden-node","type":"humidity","data":45.0,"timestamp":1700000000.25}"#
/// );
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryMessage {
    pub client_id: String,
    #[serde(rename = "type")]
    pub message_type: Channel,
    pub data: SensorValue,
    /// Seconds since the Unix epoch, with sub-second precision
    pub timestamp: f64,
}

impl TelemetryMessage {
    /// Serialize to the JSON payload sent to the broker
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_names() {
        let names: Vec<&str> = Channel::ALL.iter().map(Channel::as_str).collect();
        assert_eq!(
            names,
            vec!["temperature", "humidity", "light", "pressure", "moisture"]
        );
        assert_eq!(
            serde_json::to_value(Channel::Pressure).unwrap(),
            json!("pressure")
        );
    }

    #[test]
    fn test_nan_becomes_absent() {
        assert_eq!(SensorValue::from_f64(f64::NAN), SensorValue::Absent);
        assert_eq!(SensorValue::from(None::<f64>), SensorValue::Absent);
        assert_eq!(SensorValue::from(Some(1.5)), SensorValue::Present(1.5));
        assert!(SensorValue::Absent.as_f64().is_nan());
    }

    #[test]
    fn test_absent_serializes_as_null() {
        let message = TelemetryMessage {
            client_id: "node".to_string(),
            message_type: Channel::Light,
            data: SensorValue::Absent,
            timestamp: 10.5,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["data"], serde_json::Value::Null);
        assert_eq!(value["type"], json!("light"));

        let parsed: TelemetryMessage = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.data, SensorValue::Absent);
    }

    #[test]
    fn test_infinite_value_serializes_as_null() {
        let value = serde_json::to_value(SensorValue::Present(f64::INFINITY)).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_map_keeps_absent() {
        assert_eq!(SensorValue::Absent.map(|v| v * 2.0), SensorValue::Absent);
        assert_eq!(
            SensorValue::Present(2.0).map(|v| v * 2.0),
            SensorValue::Present(4.0)
        );
    }
}
