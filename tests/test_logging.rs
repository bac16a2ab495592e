//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that handle log format and
//! level parsing from environment variables, and the span macros.

use enviro_telemetry::observability::logging::{parse_level, LogFormat};
use enviro_telemetry::{cycle_span, mqtt_span};
use tracing::Level;

#[test]
fn test_log_format_parse_known_values() {
    assert!(matches!(LogFormat::parse("json"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("PRETTY"), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("Compact"), LogFormat::Compact));
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    // Unattended devices ship logs, so anything unknown stays machine-readable
    assert!(matches!(LogFormat::parse("invalid"), LogFormat::Json));
    assert!(matches!(LogFormat::parse(""), LogFormat::Json));
    assert!(matches!(LogFormat::parse("yaml"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_whitespace() {
    assert!(matches!(LogFormat::parse("  pretty  "), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("compact\n"), LogFormat::Compact));
    assert!(matches!(LogFormat::parse("\tjson"), LogFormat::Json));
}

#[test]
fn test_log_format_debug() {
    assert!(format!("{:?}", LogFormat::Json).contains("Json"));
    assert!(format!("{:?}", LogFormat::Pretty).contains("Pretty"));
    assert!(format!("{:?}", LogFormat::Compact).contains("Compact"));
}

#[test]
fn test_log_level_from_env_value() {
    let test_cases = vec![
        ("ERROR", Level::ERROR),
        ("WARN", Level::WARN),
        ("INFO", Level::INFO),
        ("debug", Level::DEBUG),
        ("Trace", Level::TRACE),
        ("", Level::INFO),
        ("verbose", Level::INFO),
    ];

    for (input, expected) in test_cases {
        assert_eq!(parse_level(input), expected, "Failed for input: {input}");
    }
}

#[test]
fn test_span_macros_name_their_spans() {
    tracing::subscriber::with_default(tracing_subscriber::registry(), || {
        let cycle = cycle_span!(cycle = 3u64);
        let mqtt = mqtt_span!(operation = "publish", topic = "enviro/light");

        assert_eq!(cycle.metadata().map(|m| m.name()), Some("telemetry_cycle"));
        assert_eq!(mqtt.metadata().map(|m| m.name()), Some("mqtt_operation"));
        assert!(mqtt
            .metadata()
            .is_some_and(|m| m.fields().field("topic").is_some()));
    });
}
