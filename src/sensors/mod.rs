//! Sensor board abstraction
//!
//! The loop samples the board through [`SensorBoard`] so tests can inject
//! fixed readings and the binary can read real hardware through IIO.

pub mod iio;

pub use iio::{IioSensorBoard, DEFAULT_IIO_ROOT};

use crate::protocol::messages::{Reading, SensorValue};

/// Five independently readable channels of an environmental sensor board
///
/// `None` means the channel could not be read this time.
pub trait SensorBoard: Send {
    /// Degrees Celsius
    fn temperature(&mut self) -> Option<f64>;
    /// Relative humidity in percent
    fn humidity(&mut self) -> Option<f64>;
    /// Ambient light in lux
    fn ambient_light(&mut self) -> Option<f64>;
    /// Barometric pressure in kPa
    fn pressure(&mut self) -> Option<f64>;
    /// Raw reading of the analog (soil moisture) input
    fn grove_analog(&mut self) -> Option<f64>;
}

impl Reading {
    /// Sample every channel once
    pub fn sample<S: SensorBoard + ?Sized>(board: &mut S) -> Self {
        Self {
            temperature: SensorValue::from(board.temperature()),
            humidity: SensorValue::from(board.humidity()),
            light: SensorValue::from(board.ambient_light()),
            pressure: SensorValue::from(board.pressure()),
            raw_moisture: SensorValue::from(board.grove_analog()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBoard;

    impl SensorBoard for FixedBoard {
        fn temperature(&mut self) -> Option<f64> {
            Some(21.5)
        }
        fn humidity(&mut self) -> Option<f64> {
            None
        }
        fn ambient_light(&mut self) -> Option<f64> {
            Some(f64::NAN)
        }
        fn pressure(&mut self) -> Option<f64> {
            Some(101.3)
        }
        fn grove_analog(&mut self) -> Option<f64> {
            Some(512.0)
        }
    }

    #[test]
    fn test_sample_maps_missing_and_nan_to_absent() {
        let reading = Reading::sample(&mut FixedBoard);
        assert_eq!(reading.temperature, SensorValue::Present(21.5));
        assert_eq!(reading.humidity, SensorValue::Absent);
        assert_eq!(reading.light, SensorValue::Absent);
        assert_eq!(reading.pressure, SensorValue::Present(101.3));
        assert_eq!(reading.raw_moisture, SensorValue::Present(512.0));
    }
}
