//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Per-device connectivity and event task scheduling."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! One collector per device, four independent tasks per collector.
//!
//! The connectivity task samples its [`HealthSource`] every
//! `connectivity_interval` (first sample one interval after start) and
//! publishes `device_connected_status`. The core, ran and fabric event tasks
//! each publish their gauge once after their own delay and then finish.
//! Devices without a SIM run the same tasks but never write a series.

use std::sync::Arc;
use std::time::Duration;

use ame_metrics::{
    GaugeFamily, GaugeRegistry, DEVICE_CONNECTED_STATUS, DEVICE_CONNECTION_EVENT_CORE,
    DEVICE_CONNECTION_EVENT_FABRIC, DEVICE_CONNECTION_EVENT_RAN,
};
use ame_rt::{
    deadline_or_shutdown, shutdown_channel, RateLimiter, ShutdownSignal, ShutdownTrigger,
    TaskSet, Wake,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::CollectorError;
use crate::health::HealthSource;
use crate::schedule::CollectorSchedule;

pub const ACTIVE_STATUS: &str = "Active";
pub const CORE_EVENT_MESSAGE: &str = "some core event";
pub const CORE_EVENT_COLOUR: &str = "some colour";
pub const RAN_EVENT_MESSAGE: &str = "some ran event";
pub const FABRIC_EVENT_MESSAGE: &str = "some fabric event";

/// Label values of a device's `device_connected_status` series.
pub fn connectivity_labels<'a>(site: &'a str, sim: &'a str) -> [&'a str; 3] {
    [ACTIVE_STATUS, site, sim]
}

/// The one-shot connection events published per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEvent {
    Core,
    Ran,
    Fabric,
}

impl DeviceEvent {
    pub const ALL: [DeviceEvent; 3] = [DeviceEvent::Core, DeviceEvent::Ran, DeviceEvent::Fabric];

    pub fn family(self) -> &'static GaugeFamily {
        match self {
            DeviceEvent::Core => &DEVICE_CONNECTION_EVENT_CORE,
            DeviceEvent::Ran => &DEVICE_CONNECTION_EVENT_RAN,
            DeviceEvent::Fabric => &DEVICE_CONNECTION_EVENT_FABRIC,
        }
    }

    pub fn task_name(self) -> &'static str {
        match self {
            DeviceEvent::Core => "core-event",
            DeviceEvent::Ran => "ran-event",
            DeviceEvent::Fabric => "fabric-event",
        }
    }

    pub fn delay(self, schedule: &CollectorSchedule) -> Duration {
        match self {
            DeviceEvent::Core => schedule.core_event_delay,
            DeviceEvent::Ran => schedule.ran_event_delay,
            DeviceEvent::Fabric => schedule.fabric_event_delay,
        }
    }

    /// Label values in the family's key order.
    pub fn labels<'a>(self, site: &'a str, sim: &'a str) -> Vec<&'a str> {
        match self {
            DeviceEvent::Core => vec![CORE_EVENT_MESSAGE, CORE_EVENT_COLOUR, site, sim],
            DeviceEvent::Ran => vec![RAN_EVENT_MESSAGE, site, sim],
            DeviceEvent::Fabric => vec![FABRIC_EVENT_MESSAGE, site, sim],
        }
    }
}

/// Scheduling state for a single device.
#[derive(Debug)]
pub struct DeviceCollector {
    device: Arc<Device>,
    site: Arc<str>,
    schedule: CollectorSchedule,
    gauges: Arc<GaugeRegistry>,
}

impl DeviceCollector {
    pub fn new(
        device: Device,
        site: impl Into<String>,
        schedule: CollectorSchedule,
        gauges: Arc<GaugeRegistry>,
    ) -> Self {
        Self {
            device: Arc::new(device),
            site: Arc::from(site.into()),
            schedule,
            gauges,
        }
    }

    /// Collector whose tasks are staggered on multiples of `period`. `period`
    /// must be non-zero; see [`DeviceCollector::start`].
    pub fn with_period(
        device: Device,
        period: Duration,
        site: impl Into<String>,
        gauges: Arc<GaugeRegistry>,
    ) -> Self {
        Self::new(device, site, CollectorSchedule::from_period(period), gauges)
    }

    /// Spawn the four tasks and return immediately. Must run inside a Tokio runtime.
    ///
    /// Delays are measured from this call. The tasks keep running until
    /// [`CollectorHandle::shutdown`]; dropping the handle detaches them.
    ///
    /// # Panics
    ///
    /// Panics if the schedule's `connectivity_interval` is zero. Schedules built
    /// from a validated [`AppConfig`](ame_common::config::AppConfig) never are.
    pub fn start(self, health: Box<dyn HealthSource>) -> CollectorHandle {
        info!(
            serial_number = %self.device.serial_number,
            site = %self.site,
            provisioned = self.device.is_provisioned(),
            "starting collector for device"
        );

        let started = Instant::now();
        let (trigger, connectivity_shutdown) = shutdown_channel();
        let mut tasks = TaskSet::new();

        tasks.spawn(
            "connectivity",
            run_connectivity(
                self.device.clone(),
                self.site.clone(),
                self.gauges.clone(),
                health,
                RateLimiter::delayed(self.schedule.connectivity_interval),
                connectivity_shutdown,
            ),
        );

        for event in DeviceEvent::ALL {
            tasks.spawn(
                event.task_name(),
                fire_event(
                    event,
                    self.device.clone(),
                    self.site.clone(),
                    self.gauges.clone(),
                    started + event.delay(&self.schedule),
                    trigger.subscribe(),
                ),
            );
        }

        CollectorHandle {
            serial_number: self.device.serial_number.clone(),
            trigger,
            tasks,
        }
    }
}

/// Lifecycle handle for a started [`DeviceCollector`].
#[derive(Debug)]
pub struct CollectorHandle {
    serial_number: String,
    trigger: ShutdownTrigger,
    tasks: TaskSet,
}

impl CollectorHandle {
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks still pending: the connectivity loop plus any unfired events.
    pub fn running_tasks(&self) -> usize {
        self.tasks.running()
    }

    /// Stop every task. Events that have not fired yet never will.
    pub async fn shutdown(self) -> Result<(), CollectorError> {
        let Self {
            serial_number,
            trigger,
            tasks,
        } = self;
        trigger.trigger();
        tasks
            .join()
            .await
            .map_err(|source| CollectorError::Shutdown {
                serial_number: serial_number.clone(),
                source,
            })?;
        info!(serial_number = %serial_number, "collector stopped");
        Ok(())
    }
}

async fn run_connectivity(
    device: Arc<Device>,
    site: Arc<str>,
    gauges: Arc<GaugeRegistry>,
    mut health: Box<dyn HealthSource>,
    mut limiter: RateLimiter,
    mut shutdown: ShutdownSignal,
) {
    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.requested() => {
                debug!(serial_number = %device.serial_number, ticks = tick, "connectivity task stopped");
                break;
            }
            _ = limiter.tick() => {
                tick += 1;
                let reading = health.sample();
                match device.sim() {
                    Some(sim) => {
                        gauges.set(
                            &DEVICE_CONNECTED_STATUS,
                            &connectivity_labels(&site, sim),
                            reading.gauge_value(),
                        );
                        debug!(serial_number = %device.serial_number, tick, reading = ?reading, "connectivity sampled");
                    }
                    None => {
                        debug!(serial_number = %device.serial_number, tick, "no sim; connectivity not published");
                    }
                }
            }
        }
    }
}

async fn fire_event(
    event: DeviceEvent,
    device: Arc<Device>,
    site: Arc<str>,
    gauges: Arc<GaugeRegistry>,
    deadline: Instant,
    mut shutdown: ShutdownSignal,
) {
    if deadline_or_shutdown(deadline, &mut shutdown).await == Wake::Shutdown {
        debug!(serial_number = %device.serial_number, event = event.task_name(), "event cancelled before firing");
        return;
    }
    match device.sim() {
        Some(sim) => {
            gauges.set(event.family(), &event.labels(&site, sim), 1.0);
            debug!(serial_number = %device.serial_number, event = event.task_name(), "connection event published");
        }
        None => {
            debug!(serial_number = %device.serial_number, event = event.task_name(), "no sim; event not published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{Connectivity, ScriptedHealthSource};
    use ame_metrics::new_registry;
    use std::io;
    use std::sync::Mutex;
    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;

    const PERIOD: Duration = Duration::from_secs(1);

    fn gauges() -> Arc<GaugeRegistry> {
        Arc::new(GaugeRegistry::new(new_registry()).unwrap())
    }

    async fn advance_to(start: Instant, offset: Duration) {
        tokio::time::sleep_until(start + offset).await;
    }

    fn at(periods: f64) -> Duration {
        PERIOD.mul_f64(periods)
    }

    #[test]
    fn event_labels_follow_family_order() {
        for event in DeviceEvent::ALL {
            assert_eq!(
                event.labels("site-A", "8901").len(),
                event.family().labels.len()
            );
        }
        assert_eq!(
            DeviceEvent::Core.labels("site-A", "8901"),
            vec!["some core event", "some colour", "site-A", "8901"]
        );
        assert_eq!(
            connectivity_labels("site-A", "8901"),
            ["Active", "site-A", "8901"]
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_owned)
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn start_logs_one_notice_before_any_write() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let gauges = gauges();

        tracing::subscriber::with_default(subscriber, || {
            runtime.block_on(async {
                let start = Instant::now();
                let handle = DeviceCollector::with_period(
                    Device::new("X1").with_sim("8901"),
                    PERIOD,
                    "site-A",
                    gauges.clone(),
                )
                .start(Box::new(ScriptedHealthSource::new(vec![])));

                let at_start = logs.lines();
                assert_eq!(at_start.len(), 1, "{at_start:?}");
                assert!(at_start[0].contains("INFO"));
                assert!(at_start[0].contains("serial_number=X1"));
                for family in &ame_metrics::DEVICE_FAMILIES {
                    assert_eq!(gauges.series_count(family), 0);
                }

                advance_to(start, at(6.5)).await;
                let lines = logs.lines();
                let infos: Vec<_> = lines.iter().filter(|l| l.contains("INFO")).collect();
                assert_eq!(infos.len(), 1, "{lines:?}");
                assert_eq!(infos[0], &lines[0]);
                assert!(lines.iter().any(|l| l.contains("connection event published")));
                assert!(lines.iter().any(|l| l.contains("connectivity sampled")));

                handle.shutdown().await.unwrap();
            });
        });
    }

    #[tokio::test]
    #[should_panic]
    async fn zero_period_panics_on_start() {
        DeviceCollector::with_period(
            Device::new("X1").with_sim("8901"),
            Duration::ZERO,
            "site-A",
            gauges(),
        )
        .start(Box::new(ScriptedHealthSource::new(vec![])));
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_timeline() {
        let gauges = gauges();
        let start = Instant::now();
        let health = ScriptedHealthSource::new(vec![
            Connectivity::Disconnected,
            Connectivity::Connected,
        ]);
        let handle = DeviceCollector::with_period(
            Device::new("X1").with_sim("8901"),
            PERIOD,
            "site-A",
            gauges.clone(),
        )
        .start(Box::new(health));
        assert_eq!(handle.serial_number(), "X1");
        assert_eq!(handle.task_count(), 4);

        let status = connectivity_labels("site-A", "8901");
        let core = DeviceEvent::Core.labels("site-A", "8901");
        let ran = DeviceEvent::Ran.labels("site-A", "8901");
        let fabric = DeviceEvent::Fabric.labels("site-A", "8901");

        advance_to(start, at(0.5)).await;
        assert_eq!(gauges.read(&DEVICE_CONNECTED_STATUS, &status), None);
        assert_eq!(gauges.read(&DEVICE_CONNECTION_EVENT_CORE, &core), None);

        advance_to(start, at(2.5)).await;
        assert_eq!(gauges.read(&DEVICE_CONNECTION_EVENT_CORE, &core), Some(1.0));
        assert_eq!(gauges.read(&DEVICE_CONNECTED_STATUS, &status), None);

        advance_to(start, at(3.5)).await;
        assert_eq!(gauges.read(&DEVICE_CONNECTED_STATUS, &status), Some(0.0));
        assert_eq!(gauges.read(&DEVICE_CONNECTION_EVENT_RAN, &ran), None);

        advance_to(start, at(4.5)).await;
        assert_eq!(gauges.read(&DEVICE_CONNECTION_EVENT_RAN, &ran), Some(1.0));
        assert_eq!(gauges.read(&DEVICE_CONNECTION_EVENT_FABRIC, &fabric), None);

        advance_to(start, at(6.5)).await;
        assert_eq!(gauges.read(&DEVICE_CONNECTION_EVENT_FABRIC, &fabric), Some(1.0));
        assert_eq!(gauges.read(&DEVICE_CONNECTED_STATUS, &status), Some(1.0));

        advance_to(start, at(9.5)).await;
        assert_eq!(gauges.read(&DEVICE_CONNECTED_STATUS, &status), Some(0.0));
        assert_eq!(handle.running_tasks(), 1);

        handle.shutdown().await.unwrap();
    }
}
