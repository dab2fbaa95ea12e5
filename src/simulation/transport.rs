//! Transport movement logic for the traffic simulation
//!
//! Transports are background traffic: they wander the road network at
//! random until their lifespan runs out.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::config::SimConfig;
use super::error::SimResult;
use super::grid::Grid;
use super::types::{Coordinate, Direction, TransportId};

/// Result of one transport step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStep {
    Moved(Coordinate),
    /// Tried to move but the target cell was occupied
    Blocked,
    /// Did not try this tick, or had nowhere to go
    Held,
}

#[derive(Debug, Clone)]
pub struct SimTransport {
    pub id: TransportId,
    pub direction: Direction,
    /// Total steps this transport may exist for
    pub lifespan: u32,
    pub steps_taken: u32,
    /// Consecutive blocked attempts
    pub wait_counter: u32,
}

impl SimTransport {
    pub fn new(id: TransportId, direction: Direction, lifespan: u32) -> Self {
        Self {
            id,
            direction,
            lifespan,
            steps_taken: 0,
            wait_counter: 0,
        }
    }

    /// Create a transport with a random lifespan, facing a random one of
    /// `directions`. Returns `None` when there is no direction to face.
    pub fn spawn<R: Rng + ?Sized>(
        id: TransportId,
        directions: &[Direction],
        config: &SimConfig,
        rng: &mut R,
    ) -> Option<Self> {
        let direction = *directions.choose(rng)?;
        let lifespan = rng.random_range(config.lifespan_range.clone());
        Some(Self::new(id, direction, lifespan))
    }

    pub fn is_expired(&self) -> bool {
        self.steps_taken >= self.lifespan
    }

    /// Advance one tick from `position`.
    ///
    /// The caller holds the grid lock for the duration of the call.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        position: Coordinate,
        grid: &mut Grid,
        config: &SimConfig,
        rng: &mut R,
    ) -> SimResult<TransportStep> {
        let directions = grid.passable_directions(position);

        let facing_blocked = !grid.is_passable(position.step(self.direction));
        let at_intersection = directions.len() > 2;
        let waited_too_long = self.wait_counter >= config.max_wait;

        if facing_blocked || at_intersection || waited_too_long {
            if let Some(direction) = directions.choose(rng) {
                self.direction = *direction;
            }
            self.wait_counter = 0;
        }

        let target = position.step(self.direction);
        let mut result = TransportStep::Held;

        if rng.random_bool(config.move_probability) && grid.is_passable(target) {
            if grid.is_occupied(target) {
                self.wait_counter += 1;
                result = TransportStep::Blocked;
            } else {
                grid.move_occupant(position, target)?;
                result = TransportStep::Moved(target);
            }
        }

        self.steps_taken += 1;
        Ok(result)
    }
}
