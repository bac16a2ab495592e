//! Linux IIO sensor board
//!
//! Each sensor on the board is an IIO device under `/sys/bus/iio/devices`,
//! identified by the contents of its `name` attribute. A channel value is
//! read from `<attr>_input` when the driver provides a processed value,
//! otherwise from `(<attr>_raw + <attr>_offset) * <attr>_scale`.

use super::SensorBoard;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the kernel exposes IIO devices
pub const DEFAULT_IIO_ROOT: &str = "/sys/bus/iio/devices";

/// How one board channel maps onto an IIO attribute
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelSource {
    /// Driver names that can provide this channel, first match wins
    devices: &'static [&'static str],
    /// Attribute prefix, e.g. `in_temp`
    attribute: &'static str,
    /// Multiplier from the IIO unit to the board unit
    factor: f64,
    /// Skip offset/scale and report the raw ADC count
    raw_only: bool,
}

// IIO reports temperature and relative humidity in milli-units
const TEMPERATURE: ChannelSource = ChannelSource {
    devices: &["hdc20x0", "hdc2010"],
    attribute: "in_temp",
    factor: 0.001,
    raw_only: false,
};

const HUMIDITY: ChannelSource = ChannelSource {
    devices: &["hdc20x0", "hdc2010"],
    attribute: "in_humidityrelative",
    factor: 0.001,
    raw_only: false,
};

const AMBIENT_LIGHT: ChannelSource = ChannelSource {
    devices: &["opt3001", "opt3002"],
    attribute: "in_illuminance",
    factor: 1.0,
    raw_only: false,
};

// IIO pressure is already in kPa
const PRESSURE: ChannelSource = ChannelSource {
    devices: &["bmp280", "bme280"],
    attribute: "in_pressure",
    factor: 1.0,
    raw_only: false,
};

const GROVE_ANALOG: ChannelSource = ChannelSource {
    devices: &["tla2021", "ads1015"],
    attribute: "in_voltage0",
    factor: 1.0,
    raw_only: true,
};

/// Sensor board backed by IIO sysfs attributes
#[derive(Debug, Clone)]
pub struct IioSensorBoard {
    root: PathBuf,
    /// Device name to device directory
    devices: BTreeMap<String, PathBuf>,
}

impl IioSensorBoard {
    /// Scan `root` for `iio:device*` entries and index them by name
    ///
    /// An unreadable root is not an error: every channel simply reads as absent.
    pub fn discover<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut devices = BTreeMap::new();

        match fs::read_dir(&root) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let is_device = entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.starts_with("iio:device"));
                    if !is_device {
                        continue;
                    }
                    let path = entry.path();
                    if let Ok(name) = fs::read_to_string(path.join("name")) {
                        let name = name.trim().to_string();
                        debug!(device = %name, path = %path.display(), "Found IIO device");
                        // First device found wins when names repeat
                        devices.entry(name).or_insert(path);
                    }
                }
            }
            Err(e) => {
                warn!(
                    root = %root.display(),
                    error = %e,
                    "Cannot list IIO devices, all sensor channels will read as absent"
                );
            }
        }

        info!(
            root = %root.display(),
            devices = ?devices.keys().collect::<Vec<_>>(),
            "Sensor board discovered"
        );
        Self { root, devices }
    }

    /// Directory this board was discovered from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the devices found at discovery
    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    fn read(&self, source: &ChannelSource) -> Option<f64> {
        let device = source
            .devices
            .iter()
            .find_map(|name| self.devices.get(*name))?;
        let value = if source.raw_only {
            read_attribute(device, &format!("{}_raw", source.attribute))
        } else {
            read_processed(device, source.attribute)
        };
        if value.is_none() {
            debug!(
                device = %device.display(),
                attribute = source.attribute,
                "Sensor channel unreadable"
            );
        }
        value.map(|v| v * source.factor)
    }
}

impl SensorBoard for IioSensorBoard {
    fn temperature(&mut self) -> Option<f64> {
        self.read(&TEMPERATURE)
    }

    fn humidity(&mut self) -> Option<f64> {
        self.read(&HUMIDITY)
    }

    fn ambient_light(&mut self) -> Option<f64> {
        self.read(&AMBIENT_LIGHT)
    }

    fn pressure(&mut self) -> Option<f64> {
        self.read(&PRESSURE)
    }

    fn grove_analog(&mut self) -> Option<f64> {
        self.read(&GROVE_ANALOG)
    }
}

fn read_processed(device: &Path, attribute: &str) -> Option<f64> {
    if let Some(value) = read_attribute(device, &format!("{attribute}_input")) {
        return Some(value);
    }
    let raw = read_attribute(device, &format!("{attribute}_raw"))?;
    let offset = read_attribute(device, &format!("{attribute}_offset")).unwrap_or(0.0);
    let scale = read_attribute(device, &format!("{attribute}_scale")).unwrap_or(1.0);
    Some((raw + offset) * scale)
}

fn read_attribute(device: &Path, attribute: &str) -> Option<f64> {
    fs::read_to_string(device.join(attribute))
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}
