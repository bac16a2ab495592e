//! Page rotation between publish cycles
//!
//! Three pages are shown in a fixed order, each held for one slice period,
//! so together they cover roughly one update interval.

use super::{DisplaySurface, Fill, Point};
use crate::protocol::messages::{Reading, SensorValue};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Text shown for a channel with no reading
const ABSENT_TEXT: &str = "--";

/// One screenful of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub lines: [String; 2],
}

impl Page {
    fn new(first: String, second: String) -> Self {
        Self {
            lines: [first, second],
        }
    }

    /// Text as painted, one `\n` separated line per row
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// What happened during one rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationReport {
    /// Pages handed to the display, painted or not
    pub pages_shown: usize,
    /// Pages that could not be painted
    pub render_failures: usize,
    /// Holds that ran for the full slice period
    pub holds_completed: usize,
    /// Shutdown cut the rotation short
    pub interrupted: bool,
}

/// Drives a display surface through the status pages
pub struct DisplayRotator<D: DisplaySurface> {
    surface: D,
    footer: String,
}

fn fixed2(value: SensorValue) -> String {
    match value {
        SensorValue::Present(v) => format!("{v:.2}"),
        SensorValue::Absent => ABSENT_TEXT.to_string(),
    }
}

impl<D: DisplaySurface> DisplayRotator<D> {
    pub fn new<S: Into<String>>(surface: D, footer: S) -> Self {
        Self {
            surface,
            footer: footer.into(),
        }
    }

    /// Build the three pages for a reading (pure)
    pub fn pages(reading: &Reading, moisture: SensorValue, footer: &str) -> [Page; 3] {
        [
            Page::new(
                format!("Temperature: {} C", fixed2(reading.temperature)),
                format!("Humidity: {}", fixed2(reading.humidity)),
            ),
            Page::new(
                format!("Light: {} lux", fixed2(reading.light)),
                format!("Pressure: {} kPa", fixed2(reading.pressure)),
            ),
            Page::new(format!("Moisture: {}%", fixed2(moisture)), footer.to_string()),
        ]
    }

    /// Show each page in turn, holding it for `slice`
    ///
    /// Render failures are logged and the hold still runs, so the cycle keeps
    /// its cadence. Returns early only if shutdown is requested.
    pub async fn rotate(
        &mut self,
        reading: &Reading,
        moisture: SensorValue,
        slice: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RotationReport {
        let mut report = RotationReport::default();

        for page in Self::pages(reading, moisture, &self.footer) {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            let text = page.text();
            report.pages_shown += 1;
            match self
                .surface
                .paint(&mut |canvas| canvas.text(Point::ORIGIN, &text, Fill::White))
            {
                Ok(()) => debug!(page = %text, "Display page rendered"),
                Err(e) => {
                    report.render_failures += 1;
                    warn!(error = %e, page = %text, "Failed to render display page");
                }
            }

            if hold(slice, shutdown).await {
                report.holds_completed += 1;
            } else {
                report.interrupted = true;
                break;
            }
        }

        report
    }
}

/// Sleep for `period`; false if shutdown was requested first
async fn hold(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => true,
        _ = shutdown_requested(shutdown) => false,
    }
}

/// Resolves once the shutdown flag is set; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::NullDisplay;
    use tokio::time::Instant;

    fn sample_reading() -> Reading {
        Reading {
            temperature: SensorValue::Present(21.5),
            humidity: SensorValue::Present(45.0),
            light: SensorValue::Present(300.0),
            pressure: SensorValue::Present(101.3),
            raw_moisture: SensorValue::Present(20.0),
        }
    }

    #[test]
    fn test_pages_format_two_decimals() {
        let pages = DisplayRotator::<NullDisplay>::pages(
            &sample_reading(),
            SensorValue::Present(80.0),
            "iot.benfreke.org",
        );
        assert_eq!(pages[0].text(), "Temperature: 21.50 C\nHumidity: 45.00");
        assert_eq!(pages[1].text(), "Light: 300.00 lux\nPressure: 101.30 kPa");
        assert_eq!(pages[2].text(), "Moisture: 80.00%\niot.benfreke.org");
    }

    #[test]
    fn test_absent_values_render_as_dashes() {
        let reading = Reading {
            humidity: SensorValue::Absent,
            ..sample_reading()
        };
        let pages = DisplayRotator::<NullDisplay>::pages(&reading, SensorValue::Absent, "footer");
        assert_eq!(pages[0].lines[1], "Humidity: --");
        assert_eq!(pages[2].lines[0], "Moisture: --%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_holds_three_slices() {
        let (_tx, mut rx) = watch::channel(false);
        let mut rotator = DisplayRotator::new(NullDisplay, "footer");
        let started = Instant::now();

        let report = rotator
            .rotate(
                &sample_reading(),
                SensorValue::Present(80.0),
                Duration::from_secs(3),
                &mut rx,
            )
            .await;

        assert_eq!(report.pages_shown, 3);
        assert_eq!(report.holds_completed, 3);
        assert!(!report.interrupted);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(9), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(10), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_rotation_shows_nothing() {
        let (_tx, mut rx) = watch::channel(true);
        let mut rotator = DisplayRotator::new(NullDisplay, "footer");

        let report = rotator
            .rotate(&sample_reading(), SensorValue::Absent, Duration::from_secs(3), &mut rx)
            .await;

        assert_eq!(report.pages_shown, 0);
        assert!(report.interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_does_not_cut_holds() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let mut rotator = DisplayRotator::new(NullDisplay, "footer");

        let report = rotator
            .rotate(&sample_reading(), SensorValue::Absent, Duration::from_secs(1), &mut rx)
            .await;

        assert_eq!(report.holds_completed, 3);
        assert!(!report.interrupted);
    }
}
