//! Derivation of published values from raw readings

use super::messages::{Channel, Reading, SensorValue, TelemetryMessage};
use chrono::{DateTime, Utc};

/// Calibration bounds for the moisture probe, in raw ADC units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoistureCalibration {
    pub min: i64,
    pub max: i64,
}

/// Rescale a raw moisture reading onto 0..100, inverted
///
/// A raw reading of `min` maps to 100 and `max` maps to 0. NaN is returned
/// unchanged. `min == max` is rejected when the configuration is loaded.
pub fn normalize_moisture(raw: f64, min: i64, max: i64) -> f64 {
    if raw.is_nan() {
        return raw;
    }
    let (min, max) = (min as f64, max as f64);
    100.0 - ((raw - min) / (max - min)) * 100.0
}

impl MoistureCalibration {
    pub fn normalize(&self, raw: SensorValue) -> SensorValue {
        raw.map(|value| normalize_moisture(value, self.min, self.max))
    }
}

/// Value published for a channel: moisture is calibrated, the rest pass through
pub fn derive_value(reading: &Reading, channel: Channel, calibration: MoistureCalibration) -> SensorValue {
    match channel {
        Channel::Moisture => calibration.normalize(reading.raw_moisture),
        other => reading.raw(other),
    }
}

/// Seconds since the Unix epoch as a float
pub fn epoch_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Build the wire message for one channel
pub fn build_message(
    client_id: &str,
    channel: Channel,
    value: SensorValue,
    now: DateTime<Utc>,
) -> TelemetryMessage {
    TelemetryMessage {
        client_id: client_id.to_string(),
        message_type: channel,
        data: value,
        timestamp: epoch_seconds(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_moisture_midpoint() {
        assert_eq!(normalize_moisture(20.0, 0, 100), 80.0);
        assert_eq!(normalize_moisture(50.0, 0, 100), 50.0);
    }

    #[test]
    fn test_normalize_moisture_inverted_bounds() {
        // Calibrations may run high-to-low; the formula still holds
        assert_eq!(normalize_moisture(800.0, 800, 300), 100.0);
        assert_eq!(normalize_moisture(300.0, 800, 300), 0.0);
    }

    #[test]
    fn test_normalize_moisture_nan_passthrough() {
        assert!(normalize_moisture(f64::NAN, 0, 100).is_nan());
    }

    #[test]
    fn test_derive_value_only_touches_moisture() {
        let reading = Reading {
            temperature: SensorValue::Present(21.5),
            raw_moisture: SensorValue::Present(20.0),
            ..Default::default()
        };
        let calibration = MoistureCalibration { min: 0, max: 100 };
        assert_eq!(
            derive_value(&reading, Channel::Temperature, calibration),
            SensorValue::Present(21.5)
        );
        assert_eq!(
            derive_value(&reading, Channel::Moisture, calibration),
            SensorValue::Present(80.0)
        );
        assert_eq!(
            derive_value(&reading, Channel::Light, calibration),
            SensorValue::Absent
        );
    }

    #[test]
    fn test_build_message() {
        let now = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
        let message = build_message("node-7", Channel::Pressure, SensorValue::Present(101.3), now);
        assert_eq!(message.client_id, "node-7");
        assert_eq!(message.message_type, Channel::Pressure);
        assert_eq!(message.data, SensorValue::Present(101.3));
        assert_eq!(message.timestamp, 1_700_000_000.5);
    }
}
