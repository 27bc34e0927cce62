//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Connectivity sample sources for the connectivity task."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Where the connectivity task gets its readings from.
//!
//! [`RandomHealthSource`] is the synthetic fault injector: one draw in ten
//! reports the device as disconnected. Anything else that can yield a
//! [`Connectivity`] reading (a real poller, a replayed trace) plugs in through
//! [`HealthSource`] without touching the scheduling code.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::device::Device;

/// Draws are uniform over `0..DRAW_RANGE`.
pub const DRAW_RANGE: u32 = 10;
/// The single draw that reports a disconnect.
pub const DISCONNECT_DRAW: u32 = 5;

/// One connectivity reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    pub fn from_draw(draw: u32) -> Self {
        if draw == DISCONNECT_DRAW {
            Connectivity::Disconnected
        } else {
            Connectivity::Connected
        }
    }

    pub fn gauge_value(self) -> f64 {
        match self {
            Connectivity::Connected => 1.0,
            Connectivity::Disconnected => 0.0,
        }
    }
}

/// Anything that yields a connectivity reading per tick.
pub trait HealthSource: Send + 'static {
    fn sample(&mut self) -> Connectivity;
}

/// Uniform random draws in `[0, 10)`; a draw of exactly 5 is a disconnect.
#[derive(Debug)]
pub struct RandomHealthSource {
    rng: StdRng,
}

impl RandomHealthSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn draw(&mut self) -> u32 {
        self.rng.gen_range(0..DRAW_RANGE)
    }
}

impl HealthSource for RandomHealthSource {
    fn sample(&mut self) -> Connectivity {
        Connectivity::from_draw(self.draw())
    }
}

/// Replays a fixed sequence of readings, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ScriptedHealthSource {
    readings: Vec<Connectivity>,
    cursor: usize,
}

impl ScriptedHealthSource {
    /// An empty script always reports [`Connectivity::Connected`].
    pub fn new(readings: Vec<Connectivity>) -> Self {
        Self {
            readings,
            cursor: 0,
        }
    }
}

impl HealthSource for ScriptedHealthSource {
    fn sample(&mut self) -> Connectivity {
        if self.readings.is_empty() {
            return Connectivity::Connected;
        }
        let reading = self.readings[self.cursor % self.readings.len()];
        self.cursor = self.cursor.wrapping_add(1);
        reading
    }
}

/// Random health sources for a fleet. With a base seed every device gets its
/// own deterministic stream (`seed + index`); otherwise each is entropy-seeded.
pub fn random_health_factory(
    seed: Option<u64>,
) -> impl FnMut(usize, &Device) -> Box<dyn HealthSource> {
    move |index: usize, _device: &Device| {
        let source: Box<dyn HealthSource> = match seed {
            Some(base) => Box::new(RandomHealthSource::seeded(base.wrapping_add(index as u64))),
            None => Box::new(RandomHealthSource::from_entropy()),
        };
        source
    }
}
