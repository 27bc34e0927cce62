//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Collector module exports and shared types."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Per-device collectors that keep the device gauges refreshing without any
//! real device telemetry behind them.

pub mod collector;
pub mod device;
pub mod error;
pub mod fleet;
pub mod health;
pub mod schedule;

pub use collector::{
    connectivity_labels, CollectorHandle, DeviceCollector, DeviceEvent, ACTIVE_STATUS,
    CORE_EVENT_COLOUR, CORE_EVENT_MESSAGE, FABRIC_EVENT_MESSAGE, RAN_EVENT_MESSAGE,
};
pub use device::{inventory_from_config, Device, SiteDevice};
pub use error::CollectorError;
pub use fleet::{CollectorFleet, FleetHandle};
pub use health::{
    random_health_factory, Connectivity, HealthSource, RandomHealthSource, ScriptedHealthSource,
};
pub use schedule::CollectorSchedule;
