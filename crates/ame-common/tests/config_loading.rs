//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Configuration discovery tests."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use ame_common::AppConfig;
use tempfile::tempdir;

const CONFIG: &str = r#"
site = "site-A"
period = 1

[devices.X1]
sim = "8901"
"#;

#[test]
fn first_existing_candidate_is_loaded() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("exporter.toml");
    fs::write(&present, CONFIG).unwrap();

    let loaded = AppConfig::load_with_source(&[&missing, &present]).unwrap();
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.site, "site-A");
    assert_eq!(loaded.config.period, Duration::from_secs(1));
    assert_eq!(loaded.config.devices["X1"].sim.as_deref(), Some("8901"));
}

#[test]
fn missing_candidates_are_reported() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nowhere.toml");
    let err = AppConfig::load(&[&missing]).unwrap_err();
    assert!(err.to_string().contains("nowhere.toml"));
}

#[test]
fn invalid_file_reports_its_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "period = 0\n[devices.X1]\n").unwrap();
    let err = AppConfig::from_path(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("period must be a positive duration"));
    assert!(err.to_string().contains("broken.toml"));
}
