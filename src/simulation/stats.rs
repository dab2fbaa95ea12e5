//! Run statistics and the finished-agent record

use std::fmt;

use super::agent::SimAgent;
use super::types::{AgentId, Coordinate};

/// An agent that reached a finish cell, in the order it was harvested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedAgent {
    pub id: AgentId,
    pub spawn: Coordinate,
    /// Finish cell the agent was harvested from
    pub finish: Coordinate,
    pub route_len: usize,
    pub success_steps: usize,
    pub attempts: usize,
    pub finished_at_tick: u64,
}

impl FinishedAgent {
    pub fn new(agent: &SimAgent, finish: Coordinate, tick: u64) -> Self {
        Self {
            id: agent.id,
            spawn: agent.spawn,
            finish,
            route_len: agent.route().len(),
            success_steps: agent.success_steps(),
            attempts: agent.attempts(),
            finished_at_tick: tick,
        }
    }

    /// Attempts that did not advance the agent
    pub fn blocked_attempts(&self) -> usize {
        self.attempts - self.success_steps
    }
}

impl fmt::Display for FinishedAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}, steps={}/{}, attempts={} ({} blocked), harvested at tick {}",
            self.id,
            self.spawn,
            self.finish,
            self.success_steps,
            self.route_len.saturating_sub(1),
            self.attempts,
            self.blocked_attempts(),
            self.finished_at_tick
        )
    }
}

/// Counters collected over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub ticks: u64,
    pub agents_spawned: usize,
    pub agents_finished: usize,
    /// Agent spawn cells with no reachable finish
    pub agents_stranded: usize,
    pub transports_spawned: usize,
    pub transports_expired: usize,
    pub live_agents: usize,
    pub live_transports: usize,
}

impl SimStats {
    /// Share of spawned agents that reached a finish, in percent
    pub fn success_rate(&self) -> f32 {
        if self.agents_spawned == 0 {
            return 0.0;
        }
        self.agents_finished as f32 / self.agents_spawned as f32 * 100.0
    }
}
