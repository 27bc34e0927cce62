//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Collector lifecycle errors."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use ame_rt::TaskJoinError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector for device {serial_number} did not stop cleanly")]
    Shutdown {
        serial_number: String,
        #[source]
        source: TaskJoinError,
    },
    #[error("{failed} of {total} collectors did not stop cleanly")]
    Fleet {
        failed: usize,
        total: usize,
        #[source]
        first: Box<CollectorError>,
    },
}
