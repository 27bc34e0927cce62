//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Managed device model borrowed by the collectors."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use ame_common::config::AppConfig;
use serde::{Deserialize, Serialize};

/// A managed endpoint as supplied by the device inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial_number: String,
    /// ICCID of the installed SIM. `None` marks an unprovisioned device.
    #[serde(default)]
    pub sim: Option<String>,
}

impl Device {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            sim: None,
        }
    }

    pub fn with_sim(mut self, sim: impl Into<String>) -> Self {
        self.sim = Some(sim.into());
        self
    }

    pub fn sim(&self) -> Option<&str> {
        self.sim.as_deref()
    }

    pub fn is_provisioned(&self) -> bool {
        self.sim.is_some()
    }
}

/// A device paired with the site label its gauges are published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDevice {
    pub device: Device,
    pub site: String,
}

/// Expand the configured inventory, resolving per-device site overrides.
pub fn inventory_from_config(config: &AppConfig) -> Vec<SiteDevice> {
    config
        .devices
        .iter()
        .map(|(serial, device)| SiteDevice {
            device: Device {
                serial_number: serial.clone(),
                sim: device.sim.clone(),
            },
            site: config.site_for(device).to_owned(),
        })
        .collect()
}
