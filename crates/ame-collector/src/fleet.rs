//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Starts and stops one collector per inventory device."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use ame_common::config::AppConfig;
use ame_metrics::{ExporterMetrics, GaugeRegistry};
use futures::future::join_all;
use tracing::{info, warn};

use crate::collector::{CollectorHandle, DeviceCollector};
use crate::device::{inventory_from_config, Device, SiteDevice};
use crate::error::CollectorError;
use crate::health::{random_health_factory, HealthSource};
use crate::schedule::CollectorSchedule;

/// Shared settings for every collector in a fleet.
#[derive(Debug, Clone)]
pub struct CollectorFleet {
    schedule: CollectorSchedule,
    gauges: Arc<GaugeRegistry>,
    metrics: Option<ExporterMetrics>,
}

impl CollectorFleet {
    pub fn new(schedule: CollectorSchedule, gauges: Arc<GaugeRegistry>) -> Self {
        Self {
            schedule,
            gauges,
            metrics: None,
        }
    }

    /// Fleet configured from the `period`, `schedule`, and `health` sections.
    pub fn from_config(config: &AppConfig, gauges: Arc<GaugeRegistry>) -> Self {
        Self::new(
            CollectorSchedule::from_config(config.period, &config.schedule),
            gauges,
        )
    }

    /// Track the running collector count on the exporter's own metrics.
    pub fn with_metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start one collector per device. `health` builds each device's sample
    /// source from its position in `inventory`.
    pub fn start<F>(&self, inventory: Vec<SiteDevice>, mut health: F) -> FleetHandle
    where
        F: FnMut(usize, &Device) -> Box<dyn HealthSource>,
    {
        let collectors: Vec<CollectorHandle> = inventory
            .into_iter()
            .enumerate()
            .map(|(index, SiteDevice { device, site })| {
                let source = health(index, &device);
                DeviceCollector::new(device, site, self.schedule, self.gauges.clone())
                    .start(source)
            })
            .collect();

        if let Some(metrics) = &self.metrics {
            metrics.set_collectors_active(collectors.len());
        }
        info!(collectors = collectors.len(), schedule = ?self.schedule, "collector fleet started");

        FleetHandle {
            collectors,
            metrics: self.metrics.clone(),
        }
    }

    /// Start every configured device with random health sources seeded from `health.seed`.
    pub fn start_configured(&self, config: &AppConfig) -> FleetHandle {
        self.start(
            inventory_from_config(config),
            random_health_factory(config.health.seed),
        )
    }
}

/// Lifecycle handle for every collector of a fleet.
#[derive(Debug)]
pub struct FleetHandle {
    collectors: Vec<CollectorHandle>,
    metrics: Option<ExporterMetrics>,
}

impl FleetHandle {
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn serial_numbers(&self) -> Vec<&str> {
        self.collectors
            .iter()
            .map(CollectorHandle::serial_number)
            .collect()
    }

    pub fn running_tasks(&self) -> usize {
        self.collectors
            .iter()
            .map(CollectorHandle::running_tasks)
            .sum()
    }

    /// Stop every collector concurrently.
    pub async fn shutdown(self) -> Result<(), CollectorError> {
        let total = self.collectors.len();
        let results = join_all(self.collectors.into_iter().map(CollectorHandle::shutdown)).await;
        if let Some(metrics) = &self.metrics {
            metrics.set_collectors_active(0);
        }

        let mut failures = results.into_iter().filter_map(Result::err);
        let Some(first) = failures.next() else {
            info!(collectors = total, "collector fleet stopped");
            return Ok(());
        };
        let failed = 1 + failures.count();
        warn!(failed, total, error = %first, "collector fleet stopped with errors");
        Err(CollectorError::Fleet {
            failed,
            total,
            first: Box::new(first),
        })
    }
}
