//! Tunable parameters of the traffic simulation

use std::ops::RangeInclusive;
use std::time::Duration;

use super::error::{SimError, SimResult};

/// Chance per tick that a free transport spawn cell produces a transport
pub const TRANSPORT_SPAWN_PROBABILITY: f64 = 0.04;
/// Chance per tick that a transport attempts its step
pub const TRANSPORT_MOVE_PROBABILITY: f64 = 0.7;
/// Consecutive blocked attempts before a transport picks a new direction
pub const TRANSPORT_MAX_WAIT: u32 = 5;
/// Smallest lifespan a transport can draw
pub const TRANSPORT_MIN_LIFESPAN: u32 = 15;
/// Largest lifespan a transport can draw
pub const TRANSPORT_MAX_LIFESPAN: u32 = 149;
/// How long a tick waits for every agent worker to report
pub const DEFAULT_BARRIER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub spawn_probability: f64,
    pub move_probability: f64,
    pub max_wait: u32,
    /// Closed range the transport lifespan is drawn from
    pub lifespan_range: RangeInclusive<u32>,
    /// Deadline for the agent barrier; exceeding it fails the tick
    pub barrier_timeout: Duration,
    /// Seed for the transport RNG. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            spawn_probability: TRANSPORT_SPAWN_PROBABILITY,
            move_probability: TRANSPORT_MOVE_PROBABILITY,
            max_wait: TRANSPORT_MAX_WAIT,
            lifespan_range: TRANSPORT_MIN_LIFESPAN..=TRANSPORT_MAX_LIFESPAN,
            barrier_timeout: DEFAULT_BARRIER_TIMEOUT,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Reject values the stepping rules cannot work with
    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.spawn_probability) {
            return Err(SimError::InvalidConfig(format!(
                "spawn probability {} is not within [0, 1]",
                self.spawn_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.move_probability) {
            return Err(SimError::InvalidConfig(format!(
                "move probability {} is not within [0, 1]",
                self.move_probability
            )));
        }
        if self.lifespan_range.is_empty() {
            return Err(SimError::InvalidConfig(format!(
                "lifespan range {:?} is empty",
                self.lifespan_range
            )));
        }
        if self.barrier_timeout.is_zero() {
            return Err(SimError::InvalidConfig(
                "barrier timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
