//! Display rotation tests
//!
//! Page content, order and hold timing. Holds run in paused tokio time, so
//! elapsed time is exact and the tests finish instantly.


use enviro_telemetry::display::{DisplayRotator, Fill, Point};
use enviro_telemetry::protocol::{Reading, SensorValue};
use enviro_telemetry::testing::MockDisplay;
use std::time::Duration;
use test_helpers::test_config_with_frequency;
use tokio::sync::watch;
use tokio::time::Instant;

fn reading() -> Reading {
    Reading {
        temperature: SensorValue::Present(21.5),
        humidity: SensorValue::Present(45.0),
        light: SensorValue::Present(300.0),
        pressure: SensorValue::Present(101.3),
        raw_moisture: SensorValue::Present(20.0),
    }
}

#[tokio::test(start_paused = true)]
async fn test_pages_render_in_order_at_origin() {
    let display = MockDisplay::new();
    let mut rotator = DisplayRotator::new(display.clone(), "iot.benfreke.org");
    let (_tx, mut rx) = watch::channel(false);

    rotator
        .rotate(&reading(), SensorValue::Present(80.0), Duration::from_secs(1), &mut rx)
        .await;

    let frames = display.frames();
    let texts: Vec<&str> = frames.iter().map(|frame| frame.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Temperature: 21.50 C\nHumidity: 45.00",
            "Light: 300.00 lux\nPressure: 101.30 kPa",
            "Moisture: 80.00%\niot.benfreke.org",
        ]
    );
    assert!(frames
        .iter()
        .all(|frame| frame.origin == Point::ORIGIN && frame.fill == Fill::White));
}

#[tokio::test(start_paused = true)]
async fn test_slice_period_is_a_third_of_the_update_frequency() {
    let config = test_config_with_frequency(10);
    assert_eq!(config.slice_period(), Duration::from_secs(3));

    let mut rotator = DisplayRotator::new(MockDisplay::new(), config.display_footer.clone());
    let (_tx, mut rx) = watch::channel(false);
    let started = Instant::now();

    let report = rotator
        .rotate(&reading(), SensorValue::Present(80.0), config.slice_period(), &mut rx)
        .await;

    assert_eq!(report.holds_completed, 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(9), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_short_frequency_gives_zero_holds() {
    let config = test_config_with_frequency(2);
    let display = MockDisplay::new();
    let mut rotator = DisplayRotator::new(display.clone(), "footer");
    let (_tx, mut rx) = watch::channel(false);
    let started = Instant::now();

    let report = rotator
        .rotate(&reading(), SensorValue::Absent, config.slice_period(), &mut rx)
        .await;

    assert_eq!(report.pages_shown, 3);
    assert_eq!(display.frames().len(), 3);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_still_holds() {
    let display = MockDisplay::unavailable();
    let mut rotator = DisplayRotator::new(display.clone(), "footer");
    let (_tx, mut rx) = watch::channel(false);
    let started = Instant::now();

    let report = rotator
        .rotate(&reading(), SensorValue::Present(80.0), Duration::from_secs(2), &mut rx)
        .await;

    assert_eq!(report.render_failures, 3);
    assert_eq!(report.holds_completed, 3);
    assert!(!report.interrupted);
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(display.paint_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cuts_the_current_hold() {
    let display = MockDisplay::new();
    let mut rotator = DisplayRotator::new(display.clone(), "footer");
    let (tx, mut rx) = watch::channel(false);

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        tx.send(true).unwrap();
        tx
    });
    let started = Instant::now();

    let report = rotator
        .rotate(&reading(), SensorValue::Present(80.0), Duration::from_secs(3), &mut rx)
        .await;
    let _tx = stopper.await.unwrap();

    // First hold completes, the second is cut at 4 s, the third page never shows
    assert_eq!(report.pages_shown, 2);
    assert_eq!(report.holds_completed, 1);
    assert!(report.interrupted);
    assert_eq!(display.frames().len(), 2);
    assert!(started.elapsed() < Duration::from_secs(6));
}
