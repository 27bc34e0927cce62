//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "End-to-end exporter scenario from configuration to exposition."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use ame_alerts::{alerts_to_yaml, Alert, AlertSeverity};
use ame_collector::CollectorFleet;
use ame_common::config::AppConfig;
use ame_metrics::prometheus::{Encoder, TextEncoder};
use ame_metrics::{new_registry, ExporterMetrics, GaugeRegistry, SharedRegistry};
use tokio::time::Instant;

const CONFIG: &str = r#"
site = "site-A"
period = 1

[health]
seed = 7

[devices.X1]
sim = "8901"

[devices.X2]
sim = "8902"
site = "site-B"

[devices.X3]
"#;

fn exposition(registry: &SharedRegistry) -> String {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .unwrap();
    String::from_utf8(buffer).unwrap()
}

fn has_binary_line(text: &str, prefix: &str) -> bool {
    text.lines()
        .any(|line| line == format!("{prefix} 0") || line == format!("{prefix} 1"))
}

#[tokio::test(start_paused = true)]
async fn configured_fleet_populates_the_exposition() {
    let config: AppConfig = CONFIG.parse().unwrap();
    assert_eq!(config.period, Duration::from_secs(1));

    let registry = new_registry();
    let metrics = ExporterMetrics::new(registry.clone()).unwrap();
    let gauges = Arc::new(GaugeRegistry::new(registry.clone()).unwrap());
    let start = Instant::now();
    let handle = CollectorFleet::from_config(&config, gauges)
        .with_metrics(metrics.clone())
        .start_configured(&config);
    assert_eq!(handle.len(), 3);
    assert_eq!(handle.serial_numbers(), vec!["X1", "X2", "X3"]);
    assert_eq!(metrics.collectors_active(), 3);

    tokio::time::sleep_until(start + Duration::from_millis(6500)).await;
    let text = exposition(&registry);

    assert!(text.contains("# HELP device_connected_status Device Status"));
    assert!(has_binary_line(
        &text,
        r#"device_connected_status{device_status="Active",iccid="8901",site="site-A"}"#
    ));
    assert!(has_binary_line(
        &text,
        r#"device_connected_status{device_status="Active",iccid="8902",site="site-B"}"#
    ));
    assert!(text.lines().any(|line| line
        == r#"device_connection_event_core{colour="some colour",iccid="8901",msg="some core event",site="site-A"} 1"#));
    assert!(text.lines().any(|line| line
        == r#"device_connection_event_ran{iccid="8902",msg="some ran event",site="site-B"} 1"#));
    assert!(text.lines().any(|line| line
        == r#"device_connection_event_fabric{iccid="8901",msg="some fabric event",site="site-A"} 1"#));
    // X3 has no SIM and contributes no series.
    assert_eq!(text.matches("device_connected_status{").count(), 2);

    handle.shutdown().await.unwrap();
    assert_eq!(metrics.collectors_active(), 0);
}

#[test]
fn cleared_alert_serializes_to_yaml() {
    let mut alert = Alert::raise(
        "devices/X1/connected",
        "device X1 lost connectivity",
        AlertSeverity::Critical,
    );
    assert!(alert.is_active());
    let cleared_at = alert.raised_at;
    alert.clear(cleared_at);
    assert!(!alert.is_active());
    let yaml = alerts_to_yaml(&[alert]).unwrap();
    assert!(yaml.contains("severity: CRITICAL"));
    assert!(yaml.contains("cleared-at:"));
}
