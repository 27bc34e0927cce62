//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Named delays for the four collector tasks."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use ame_common::config::ScheduleConfig;

/// Cadence of the repeating connectivity task and delays of the one-shot event tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSchedule {
    pub connectivity_interval: Duration,
    pub core_event_delay: Duration,
    pub ran_event_delay: Duration,
    pub fabric_event_delay: Duration,
}

impl CollectorSchedule {
    /// Stagger every task on a multiple of `period`: connectivity every 3x,
    /// core/ran/fabric events once after 2x, 4x and 6x.
    pub fn from_period(period: Duration) -> Self {
        Self {
            connectivity_interval: period * 3,
            core_event_delay: period * 2,
            ran_event_delay: period * 4,
            fabric_event_delay: period * 6,
        }
    }

    /// Derive from `period`, replacing entries the config overrides.
    pub fn from_config(period: Duration, overrides: &ScheduleConfig) -> Self {
        let base = Self::from_period(period);
        Self {
            connectivity_interval: overrides
                .connectivity_interval
                .unwrap_or(base.connectivity_interval),
            core_event_delay: overrides.core_event_delay.unwrap_or(base.core_event_delay),
            ran_event_delay: overrides.ran_event_delay.unwrap_or(base.ran_event_delay),
            fabric_event_delay: overrides
                .fabric_event_delay
                .unwrap_or(base.fabric_event_delay),
        }
    }
}
