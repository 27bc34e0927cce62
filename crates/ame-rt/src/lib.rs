//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the device collectors."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Scheduling helpers for the exporter runtime.

pub mod scheduling;

pub use scheduling::{
    deadline_or_shutdown, shutdown_channel, RateLimiter, ShutdownSignal, ShutdownTrigger,
    TaskJoinError, TaskSet, Wake,
};
