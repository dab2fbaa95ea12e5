//! Agent movement logic for the traffic simulation
//!
//! An agent follows the route it was given at spawn, one cell per tick,
//! and yields whenever its next cell is taken.

use super::error::SimResult;
use super::grid::Grid;
use super::types::{AgentId, Coordinate, Direction};

/// Result of one agent step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStep {
    /// Advanced to the contained coordinate
    Moved(Coordinate),
    /// Next route cell was occupied; held position
    Blocked,
    /// Route exhausted; nothing to do
    Idle,
}

/// An agent travelling from its spawn cell to a finish cell
#[derive(Debug, Clone)]
pub struct SimAgent {
    pub id: AgentId,
    pub spawn: Coordinate,
    pub direction: Direction,
    route: Vec<Coordinate>,
    success_steps: usize,
    attempts: usize,
}

impl SimAgent {
    pub fn new(id: AgentId, spawn: Coordinate, route: Vec<Coordinate>) -> Self {
        Self {
            id,
            spawn,
            direction: Direction::Up,
            route,
            success_steps: 0,
            attempts: 0,
        }
    }

    pub fn route(&self) -> &[Coordinate] {
        &self.route
    }

    /// Successful moves so far; also the index of the current route cell
    pub fn success_steps(&self) -> usize {
        self.success_steps
    }

    /// Step attempts so far, whether or not they moved
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Last confirmed position
    pub fn position(&self) -> Coordinate {
        self.route
            .get(self.success_steps)
            .copied()
            .unwrap_or(self.spawn)
    }

    /// The cell this agent will try next, if its route has one
    pub fn next_target(&self) -> Option<Coordinate> {
        self.route.get(self.success_steps + 1).copied()
    }

    pub fn route_exhausted(&self) -> bool {
        self.next_target().is_none()
    }

    /// Try to advance one cell along the route.
    ///
    /// Must run while the caller holds exclusive access to the grid: the
    /// occupancy check and the move form one critical section.
    pub fn step(&mut self, grid: &mut Grid) -> SimResult<AgentStep> {
        self.attempts += 1;

        let Some(next) = self.next_target() else {
            return Ok(AgentStep::Idle);
        };

        if grid.is_occupied(next) {
            return Ok(AgentStep::Blocked);
        }

        let current = self.position();
        grid.move_occupant(current, next)?;
        if let Some(direction) = current.direction_to(next) {
            self.direction = direction;
        }
        self.success_steps += 1;
        Ok(AgentStep::Moved(next))
    }
}
