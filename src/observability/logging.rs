//! Structured logging system using tracing crate
//!
//! Provides contextual, machine-readable logging with span macros for the
//! telemetry cycle and MQTT operations.
//!
//! ## Log Format Options
//!
//! The output format is controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON format for log shipping off the device
//! - `pretty` - Human-readable format with colors and indentation
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to INFO
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! # Unattended device, logs collected by journald
//! LOG_FORMAT=json LOG_LEVEL=INFO ./enviro-telemetry sensor_config.txt
//!
//! # Bench debugging on the board
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./enviro-telemetry sensor_config.txt
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Log output format, selected by `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for journald or log shipping
    Json,
    /// Multi-line, coloured, for a developer at the bench
    Pretty,
    /// Single-line, coloured
    Compact,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value; anything unrecognised is JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Dependencies that are noisy at INFO
const QUIET_TARGETS: [&str; 3] = ["rumqttc=warn", "rustls=warn", "tokio=warn"];

/// Level filter with dependency noise suppressed; `RUST_LOG` replaces it entirely
pub fn build_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log {
        return EnvFilter::new(directives);
    }
    QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::new(level.to_string()), EnvFilter::add_directive)
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Install the global subscriber
///
/// Only the first call in a process takes effect.
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let rust_log = env::var("RUST_LOG").ok();
    let registry = tracing_subscriber::registry().with(build_filter(level, rust_log.as_deref()));
    let events = span_events(include_spans);

    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_span_events(events))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_ansi(true).with_span_events(events))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(events),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Initialize logging from `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS`
pub fn init_default_logging() {
    let level = env::var("LOG_LEVEL").map_or(Level::INFO, |value| parse_level(&value));
    let format = env::var("LOG_FORMAT").map_or(LogFormat::Json, |value| LogFormat::parse(&value));
    let include_spans = env::var("LOG_SPANS").is_ok_and(|value| parse_flag(&value));

    init_logging(level, format, include_spans);
}

/// `true` only for a case-insensitive "true"
pub fn parse_flag(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}

/// Parse a `LOG_LEVEL` value; anything unrecognised is INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Create a span for one sample/publish/display cycle
#[macro_export]
macro_rules! cycle_span {
    ($($field:tt)*) => {
        tracing::info_span!("telemetry_cycle", $($field)*)
    };
}

/// Create an MQTT operation span
#[macro_export]
macro_rules! mqtt_span {
    ($($field:tt)*) => {
        tracing::info_span!("mqtt_operation", $($field)*)
    };
}

// Re-export macros for convenience
pub use {cycle_span, mqtt_span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("Pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("COMPACT"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("syslog"), LogFormat::Json);
    }

    #[test]
    fn test_parse_level() {
        let test_cases = vec![
            ("ERROR", Level::ERROR),
            ("warn", Level::WARN),
            ("Info", Level::INFO),
            ("DEBUG", Level::DEBUG),
            (" trace ", Level::TRACE),
            ("invalid", Level::INFO),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_level(input), expected, "Failed for input: {input}");
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE\n"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("1"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_filter_quiets_mqtt_client() {
        let filter = build_filter(Level::DEBUG, None).to_string();
        assert!(filter.contains("rumqttc=warn"), "filter was {filter}");
        assert!(filter.contains("debug"), "filter was {filter}");
    }

    #[test]
    fn test_rust_log_replaces_defaults() {
        let filter = build_filter(Level::INFO, Some("enviro_telemetry=trace")).to_string();
        assert_eq!(filter, "enviro_telemetry=trace");
    }
}
