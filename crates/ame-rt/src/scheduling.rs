//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the device collectors."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Async rate limiter that keeps loop iterations on a fixed cadence.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    /// First tick completes one full period from now.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn delayed(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Create a linked shutdown trigger and its first signal.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = broadcast::channel(16);
    (ShutdownTrigger { tx }, ShutdownSignal::new(rx))
}

/// Sending half of a shutdown broadcast.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: broadcast::Sender<()>,
}

impl ShutdownTrigger {
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.tx.subscribe())
    }

    /// Notify every live signal. Returns the number of listeners reached.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }
}

/// Receiving half of a shutdown broadcast.
///
/// Dropping every [`ShutdownTrigger`] without triggering detaches the listeners:
/// [`ShutdownSignal::requested`] then never resolves.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    fired: bool,
}

impl ShutdownSignal {
    fn new(rx: broadcast::Receiver<()>) -> Self {
        Self { rx, fired: false }
    }

    /// Resolves once shutdown has been triggered. Cancel safe.
    pub async fn requested(&mut self) {
        if self.fired {
            return;
        }
        match self.rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => self.fired = true,
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

/// Outcome of [`deadline_or_shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Shutdown,
}

/// Sleep until `deadline` unless shutdown is requested first.
pub async fn deadline_or_shutdown(deadline: Instant, shutdown: &mut ShutdownSignal) -> Wake {
    tokio::select! {
        biased;
        _ = shutdown.requested() => Wake::Shutdown,
        _ = tokio::time::sleep_until(deadline) => Wake::Elapsed,
    }
}

#[derive(Debug, Error)]
#[error("task '{name}' failed to join: {source}")]
pub struct TaskJoinError {
    pub name: String,
    #[source]
    pub source: JoinError,
}

/// Named set of spawned tasks that can be joined as a unit.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.tasks.push((name.into(), handle));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks that have not completed yet.
    pub fn running(&self) -> usize {
        self.tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Await every task, reporting the first one that panicked or was aborted.
    pub async fn join(self) -> Result<(), TaskJoinError> {
        let mut first_error = None;
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => debug!(task = %name, "task joined"),
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(TaskJoinError { name, source });
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
