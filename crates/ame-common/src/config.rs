//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Exporter configuration model, loading, and validation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::debug;

use crate::logging::LogFormat;

fn default_site() -> String {
    "default".to_owned()
}

fn default_period() -> Duration {
    Duration::from_secs(1)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

/// Primary configuration object for the exporter daemon.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site label applied to every device without its own override.
    #[serde(default = "default_site")]
    pub site: String,
    /// Base period the per-task delays are derived from, in (fractional) seconds.
    #[serde(default = "default_period")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub period: Duration,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub health: HealthConfig,
    /// Managed devices keyed by serial number, in file order.
    #[serde(default)]
    pub devices: IndexMap<String, DeviceConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "AME_CONFIG";

    /// Load configuration from disk, respecting the `AME_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read, parse, and validate a single configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Site label for a device, honouring its per-device override.
    pub fn site_for<'a>(&'a self, device: &'a DeviceConfig) -> &'a str {
        device.site.as_deref().unwrap_or(&self.site)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.site.trim().is_empty() {
            return Err(anyhow!("site label cannot be empty"));
        }
        if self.period.is_zero() {
            return Err(anyhow!("period must be a positive duration"));
        }
        self.schedule.validate()?;
        if self.devices.is_empty() {
            return Err(anyhow!("configuration must contain at least one device"));
        }
        for (serial, device) in &self.devices {
            device.validate(serial)?;
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            period: default_period(),
            schedule: ScheduleConfig::default(),
            health: HealthConfig::default(),
            devices: IndexMap::new(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Per-task overrides. Unset entries fall back to multiples of the base period.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    #[serde(default)]
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub connectivity_interval: Option<Duration>,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub core_event_delay: Option<Duration>,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub ran_event_delay: Option<Duration>,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub fabric_event_delay: Option<Duration>,
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        let entries = [
            ("connectivity_interval", self.connectivity_interval),
            ("core_event_delay", self.core_event_delay),
            ("ran_event_delay", self.ran_event_delay),
            ("fabric_event_delay", self.fabric_event_delay),
        ];
        for (name, value) in entries {
            if matches!(value, Some(d) if d.is_zero()) {
                return Err(anyhow!("schedule.{} must be a positive duration", name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthConfig {
    /// Seed for the random health source. Entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    /// ICCID of the device SIM. Devices without one emit nothing.
    #[serde(default)]
    pub sim: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

impl DeviceConfig {
    pub fn validate(&self, serial: &str) -> Result<()> {
        if serial.trim().is_empty() {
            return Err(anyhow!("device serial number cannot be empty"));
        }
        if matches!(&self.sim, Some(sim) if sim.trim().is_empty()) {
            return Err(anyhow!("device '{}' declares an empty sim", serial));
        }
        if matches!(&self.site, Some(site) if site.trim().is_empty()) {
            return Err(anyhow!("device '{}' declares an empty site", serial));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
site = "site-A"
period = 2

[schedule]
ran_event_delay = 5

[health]
seed = 7

[devices.X1]
sim = "8901"

[devices.X2]

[devices.X3]
sim = "8903"
site = "site-B"

[metrics]
enabled = false
"#;

    #[test]
    fn parses_sample_configuration() {
        let config: AppConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.site, "site-A");
        assert_eq!(config.period, Duration::from_secs(2));
        assert_eq!(config.schedule.ran_event_delay, Some(Duration::from_secs(5)));
        assert_eq!(config.schedule.core_event_delay, None);
        assert_eq!(config.health.seed, Some(7));
        assert!(!config.metrics.enabled);
        let serials: Vec<_> = config.devices.keys().cloned().collect();
        assert_eq!(serials, vec!["X1", "X2", "X3"]);
        assert_eq!(config.devices["X2"].sim, None);
    }

    #[test]
    fn device_site_override_is_honoured() {
        let config: AppConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.site_for(&config.devices["X1"]), "site-A");
        assert_eq!(config.site_for(&config.devices["X3"]), "site-B");
    }

    #[test]
    fn accepts_sub_second_periods() {
        let raw = "period = 0.25\n[schedule]\nconnectivity_interval = 1.5\n[devices.X1]\n";
        let config: AppConfig = raw.parse().unwrap();
        assert_eq!(config.period, Duration::from_millis(250));
        assert_eq!(
            config.schedule.connectivity_interval,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn rejects_negative_period() {
        assert!("period = -1.0\n[devices.X1]\n".parse::<AppConfig>().is_err());
    }

    #[test]
    fn rejects_zero_period() {
        let err = "period = 0\n[devices.X1]\n".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("period"));
    }

    #[test]
    fn rejects_empty_site() {
        let err = "site = \" \"\n[devices.X1]\n".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("site"));
    }

    #[test]
    fn rejects_zero_schedule_override() {
        let err = "[schedule]\ncore_event_delay = 0\n[devices.X1]\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("core_event_delay"));
    }

    #[test]
    fn rejects_missing_devices() {
        let err = "site = \"site-A\"\n".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("at least one device"));
    }

    #[test]
    fn rejects_empty_sim() {
        let err = "[devices.X1]\nsim = \"\"\n".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("empty sim"));
    }
}
