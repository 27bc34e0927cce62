//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the Aether mock exporter workspace: configuration
//! loading and validation plus the tracing bootstrap used by every process.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, DeviceConfig, HealthConfig, LoadedAppConfig, LoggingConfig, MetricsConfig,
    ScheduleConfig,
};
pub use logging::{init_test_tracing, init_tracing, LogFormat};
