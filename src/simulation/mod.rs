//! Grid traffic simulation module
//!
//! Agents follow shortest routes from spawn cells to finish cells while
//! transports wander the roads as background traffic. Every cell holds at
//! most one occupant. Agents step concurrently on worker threads behind a
//! per-tick barrier.

mod agent;
mod agent_pool;
mod config;
mod error;
mod grid;
mod map;
mod road_network;
mod stats;
mod transport;
mod types;
mod world;

pub use agent::{AgentStep, SimAgent};
pub use agent_pool::{AgentPool, AgentStatus, StepReport, WorkerCommand};
pub use config::{
    SimConfig, DEFAULT_BARRIER_TIMEOUT, TRANSPORT_MAX_LIFESPAN, TRANSPORT_MAX_WAIT,
    TRANSPORT_MIN_LIFESPAN, TRANSPORT_MOVE_PROBABILITY, TRANSPORT_SPAWN_PROBABILITY,
};
pub use error::{SimError, SimResult};
pub use grid::{Cell, Grid};
pub use map::{load_map, parse_map};
pub use road_network::{find_route, RoadNetwork};
pub use stats::{FinishedAgent, SimStats};
pub use transport::{SimTransport, TransportStep};
pub use types::{
    AgentId, CellType, CellView, Coordinate, Direction, Occupant, OccupantKind, SimId,
    TransportId,
};
pub use world::{SimWorld, TransportSlot};
