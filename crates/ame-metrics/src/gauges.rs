//! ---
//! ems_section: "03-metrics"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Labelled gauge registry shared by every device collector."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Named gauge families keyed by ordered label tuples.
//!
//! Each family is registered once as a [`GaugeVec`] on the shared prometheus
//! registry, so whatever is written here is exactly what the scrape endpoint
//! exposes. Writes overwrite the addressed series; reads never create one.

use std::collections::HashMap;

use anyhow::{Context, Result};
use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts};
use tracing::warn;

use crate::SharedRegistry;

/// Static description of one gauge family: name, help text, and label keys in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GaugeFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl GaugeFamily {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }
}

pub const DEVICE_CONNECTED_STATUS: GaugeFamily = GaugeFamily::new(
    "device_connected_status",
    "Device Status",
    &["device_status", "site", "iccid"],
);

pub const DEVICE_CONNECTION_EVENT_CORE: GaugeFamily = GaugeFamily::new(
    "device_connection_event_core",
    "Device Connection Event Core",
    &["msg", "colour", "site", "iccid"],
);

pub const DEVICE_CONNECTION_EVENT_RAN: GaugeFamily = GaugeFamily::new(
    "device_connection_event_ran",
    "Device Connection Event Ran",
    &["msg", "site", "iccid"],
);

pub const DEVICE_CONNECTION_EVENT_FABRIC: GaugeFamily = GaugeFamily::new(
    "device_connection_event_fabric",
    "Device Connection Event Fabric",
    &["msg", "site", "iccid"],
);

/// Every family driven by the device collectors.
pub const DEVICE_FAMILIES: [GaugeFamily; 4] = [
    DEVICE_CONNECTED_STATUS,
    DEVICE_CONNECTION_EVENT_CORE,
    DEVICE_CONNECTION_EVENT_RAN,
    DEVICE_CONNECTION_EVENT_FABRIC,
];

/// Process-wide gauge state, safe for any number of concurrent writers and readers.
#[derive(Clone)]
pub struct GaugeRegistry {
    registry: SharedRegistry,
    families: HashMap<&'static str, GaugeVec>,
}

impl GaugeRegistry {
    /// Register the device families on `registry`.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        Self::with_families(registry, &DEVICE_FAMILIES)
    }

    /// Register an arbitrary set of families on `registry`.
    pub fn with_families(registry: SharedRegistry, families: &[GaugeFamily]) -> Result<Self> {
        let mut registered = HashMap::with_capacity(families.len());
        for family in families {
            let vec = GaugeVec::new(Opts::new(family.name, family.help), family.labels)
                .with_context(|| format!("invalid gauge family {}", family.name))?;
            registry
                .register(Box::new(vec.clone()))
                .with_context(|| format!("failed to register gauge family {}", family.name))?;
            registered.insert(family.name, vec);
        }
        Ok(Self {
            registry,
            families: registered,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Overwrite the current value of one series. Unknown families and label
    /// arity mismatches are logged and dropped.
    pub fn set(&self, family: &GaugeFamily, labels: &[&str], value: f64) {
        let Some(vec) = self.families.get(family.name) else {
            warn!(family = family.name, "gauge family not registered; dropping write");
            return;
        };
        match vec.get_metric_with_label_values(labels) {
            Ok(gauge) => gauge.set(value),
            Err(err) => {
                warn!(family = family.name, labels = ?labels, error = %err, "rejected gauge write");
            }
        }
    }

    /// Last value written to a series, or `None` if it was never written.
    pub fn read(&self, family: &GaugeFamily, labels: &[&str]) -> Option<f64> {
        let vec = self.families.get(family.name)?;
        if labels.len() != family.labels.len() {
            return None;
        }
        vec.collect()
            .iter()
            .flat_map(|mf| mf.get_metric())
            .find(|metric| {
                family.labels.iter().zip(labels).all(|(key, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
                })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Number of label tuples currently present in a family.
    pub fn series_count(&self, family: &GaugeFamily) -> usize {
        self.families
            .get(family.name)
            .map(|vec| {
                vec.collect()
                    .iter()
                    .map(|mf| mf.get_metric().len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for GaugeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.families.keys().collect();
        names.sort();
        f.debug_struct("GaugeRegistry")
            .field("families", &names)
            .finish_non_exhaustive()
    }
}
