//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the shared grid, the agent workers and the transports,
//! and drives the tick phases in a fixed order: despawn agents, despawn
//! transports, move agents (barrier), move transports, spawn transports.

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::agent::SimAgent;
use super::agent_pool::{lock_grid, AgentPool, AgentStatus};
use super::config::SimConfig;
use super::error::{SimError, SimResult};
use super::grid::Grid;
use super::road_network::RoadNetwork;
use super::stats::{FinishedAgent, SimStats};
use super::transport::{SimTransport, TransportStep};
use super::types::{AgentId, CellType, CellView, Coordinate, Occupant, SimId, TransportId};

/// A live transport and the cell it stands on
#[derive(Debug, Clone)]
pub struct TransportSlot {
    pub transport: SimTransport,
    pub position: Coordinate,
}

/// The main simulation world
pub struct SimWorld {
    grid: Arc<Mutex<Grid>>,
    config: SimConfig,

    /// Live agents, one worker thread each
    agents: AgentPool,

    /// Live transports, evaluated in id (spawn) order
    transports: BTreeMap<TransportId, TransportSlot>,

    /// Harvested agents in despawn order
    finished: Vec<FinishedAgent>,

    /// Agent spawn cells with no reachable finish
    stranded: Vec<Coordinate>,

    finish_cells: Vec<Coordinate>,
    transport_spawns: Vec<Coordinate>,

    /// Next ID to assign
    next_id: usize,

    tick: u64,
    rng: StdRng,
    stats: SimStats,

    /// Set once a tick fails; the world refuses to continue afterwards
    halted: bool,
}

impl SimWorld {
    /// Build a world from a grid: one agent per agent spawn cell with its
    /// route fixed now, followed by one transport spawn pass.
    pub fn new(grid: Grid, config: SimConfig) -> SimResult<Self> {
        config.validate()?;

        let network = RoadNetwork::from_grid(&grid);
        let finish_cells = grid.coords_of(CellType::Finish).to_vec();
        let transport_spawns = grid.coords_of(CellType::TransportSpawn).to_vec();
        let agent_spawns = grid.coords_of(CellType::AgentSpawn).to_vec();
        info!(
            "Building world {}x{}: {} agent spawns, {} transport spawns, {} finishes",
            grid.width(),
            grid.height(),
            agent_spawns.len(),
            transport_spawns.len(),
            finish_cells.len()
        );

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let grid = Arc::new(Mutex::new(grid));
        let agents = AgentPool::new(Arc::clone(&grid));

        let mut world = Self {
            grid,
            config,
            agents,
            transports: BTreeMap::new(),
            finished: Vec::new(),
            stranded: Vec::new(),
            finish_cells,
            transport_spawns,
            next_id: 0,
            tick: 0,
            rng,
            stats: SimStats::default(),
            halted: false,
        };

        for spawn in agent_spawns {
            let route = network.find_route(spawn, &world.finish_cells);
            world.spawn_agent(spawn, route)?;
        }

        world.spawn_transports()?;
        Ok(world)
    }

    /// Create a world with a seeded RNG for reproducible transport traffic
    pub fn new_with_seed(grid: Grid, seed: u64) -> SimResult<Self> {
        Self::new(grid, SimConfig::with_seed(seed))
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place an agent on its spawn cell and start its worker.
    /// An empty route means no finish is reachable: the agent is refused.
    fn spawn_agent(&mut self, spawn: Coordinate, route: Vec<Coordinate>) -> SimResult<()> {
        if route.is_empty() {
            warn!("No finish reachable from agent spawn {}; agent not created", spawn);
            self.stranded.push(spawn);
            self.stats.agents_stranded += 1;
            return Ok(());
        }

        let id = AgentId(self.next_sim_id());
        lock_grid(&self.grid)?.place(spawn, Occupant::Agent(id))?;
        info!(
            "Spawned {} at {} heading for {} ({} steps)",
            id,
            spawn,
            route[route.len() - 1],
            route.len() - 1
        );
        self.agents.spawn(SimAgent::new(id, spawn, route))?;
        self.stats.agents_spawned += 1;
        Ok(())
    }

    /// Advance the simulation by one tick.
    ///
    /// An error is fatal: the world halts and every later call fails.
    pub fn tick(&mut self) -> SimResult<()> {
        if self.halted {
            return Err(SimError::Halted);
        }

        self.tick += 1;
        match self.run_phases() {
            Ok(()) => {
                self.stats.ticks = self.tick;
                Ok(())
            }
            Err(e) => {
                error!("Tick {} failed: {}", self.tick, e);
                self.halted = true;
                Err(e)
            }
        }
    }

    fn run_phases(&mut self) -> SimResult<()> {
        self.despawn_agents()?;
        self.despawn_transports()?;
        self.move_agents()?;
        self.move_transports()?;
        self.spawn_transports()
    }

    /// Harvest every agent standing on a finish cell.
    ///
    /// Each agent leaves the grid and the pool together, so a failed join
    /// leaves the agents behind it untouched.
    fn despawn_agents(&mut self) -> SimResult<()> {
        for finish in &self.finish_cells {
            let id = {
                let mut grid = lock_grid(&self.grid)?;
                match grid.occupant(*finish) {
                    Some(Occupant::Agent(id)) => {
                        grid.clear(*finish);
                        id
                    }
                    _ => continue,
                }
            };

            let agent = self.agents.despawn(id)?;
            let record = FinishedAgent::new(&agent, *finish, self.tick);
            info!("Finished {}", record);
            self.finished.push(record);
            self.stats.agents_finished += 1;
        }
        Ok(())
    }

    /// Remove transports whose lifespan is used up
    fn despawn_transports(&mut self) -> SimResult<()> {
        let mut grid = lock_grid(&self.grid)?;
        let mut expired = Vec::new();
        for (id, slot) in &self.transports {
            if slot.transport.is_expired() {
                expired.push(*id);
            }
        }

        for id in expired {
            if let Some(slot) = self.transports.remove(&id) {
                grid.clear(slot.position);
                debug!(
                    "{} expired at {} after {} steps",
                    id, slot.position, slot.transport.steps_taken
                );
                self.stats.transports_expired += 1;
            }
        }
        Ok(())
    }

    /// Barrier phase: every live agent takes exactly one step
    fn move_agents(&mut self) -> SimResult<()> {
        if self.agents.is_empty() {
            return Ok(());
        }
        let outcomes = self.agents.step_all(self.config.barrier_timeout)?;
        debug!("Tick {}: {} agent steps", self.tick, outcomes.len());
        Ok(())
    }

    /// Advance every live transport in id order
    fn move_transports(&mut self) -> SimResult<()> {
        let mut grid = lock_grid(&self.grid)?;
        for slot in self.transports.values_mut() {
            let step =
                slot.transport
                    .step(slot.position, &mut grid, &self.config, &mut self.rng)?;
            if let TransportStep::Moved(to) = step {
                slot.position = to;
            }
        }
        Ok(())
    }

    /// Roll for a new transport on every free transport spawn cell
    fn spawn_transports(&mut self) -> SimResult<()> {
        let mut grid = lock_grid(&self.grid)?;
        for coord in &self.transport_spawns {
            if grid.is_occupied(*coord) || !self.rng.random_bool(self.config.spawn_probability) {
                continue;
            }

            let directions = grid.passable_directions(*coord);
            let id = TransportId(SimId(self.next_id));
            let Some(transport) =
                SimTransport::spawn(id, &directions, &self.config, &mut self.rng)
            else {
                debug!("Transport spawn {} has no exits", coord);
                continue;
            };
            self.next_id += 1;

            grid.place(*coord, Occupant::Transport(id))?;
            debug!(
                "Spawned {} at {} facing {:?} for {} steps",
                id, coord, transport.direction, transport.lifespan
            );
            self.transports.insert(
                id,
                TransportSlot {
                    transport,
                    position: *coord,
                },
            );
            self.stats.transports_spawned += 1;
        }
        Ok(())
    }

    /// True once no agent is left alive
    pub fn is_finished(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Agents that reached a finish, in despawn order
    pub fn finished_agents(&self) -> &[FinishedAgent] {
        &self.finished
    }

    /// Agent spawn cells that were never populated
    pub fn stranded_agents(&self) -> &[Coordinate] {
        &self.stranded
    }

    pub fn live_agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn live_transport_count(&self) -> usize {
        self.transports.len()
    }

    pub fn agent_status(&self, id: AgentId) -> Option<&AgentStatus> {
        self.agents.status(id)
    }

    pub fn agent_statuses(&self) -> impl Iterator<Item = &AgentStatus> {
        self.agents.statuses()
    }

    pub fn transport(&self, id: TransportId) -> Option<&TransportSlot> {
        self.transports.get(&id)
    }

    pub fn transports(&self) -> impl Iterator<Item = (&TransportId, &TransportSlot)> {
        self.transports.iter()
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            live_agents: self.agents.len(),
            live_transports: self.transports.len(),
            ..self.stats.clone()
        }
    }

    /// Handle to the shared grid, for readers on other threads. Occupancy
    /// must only change through the tick phases.
    pub fn shared_grid(&self) -> Arc<Mutex<Grid>> {
        Arc::clone(&self.grid)
    }

    /// Read the grid for drawing. A poisoned lock still yields the last
    /// consistent state, which is fine for display.
    fn read_grid(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn width(&self) -> usize {
        self.read_grid().width()
    }

    pub fn height(&self) -> usize {
        self.read_grid().height()
    }

    /// Cell type and occupant kind at `coord`
    pub fn cell_view(&self, coord: Coordinate) -> Option<CellView> {
        self.read_grid().view(coord)
    }

    /// Number of cells holding an occupant
    pub fn occupied_cells(&self) -> usize {
        self.read_grid().occupied_count()
    }

    /// Every occupant currently on the grid with its cell
    pub fn occupants(&self) -> Vec<(Coordinate, Occupant)> {
        self.read_grid()
            .cells()
            .filter_map(|cell| cell.occupant().map(|occupant| (cell.coord, occupant)))
            .collect()
    }

    /// Render the grid as text, one character per cell
    pub fn render_ascii(&self) -> String {
        let grid = self.read_grid();
        let mut out = String::with_capacity((grid.width() + 1) * grid.height());
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let coord = Coordinate::new(x as i32, y as i32);
                out.push(grid.view(coord).map_or(' ', |view| view.glyph()));
            }
            out.push('\n');
        }
        out
    }

    /// Stop every agent worker. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.agents.shutdown();
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let stats = self.stats();
        println!("=== Traffic Simulation Summary ===");
        println!("Tick: {}", stats.ticks);
        println!(
            "Agents: {} live, {} finished, {} stranded",
            stats.live_agents, stats.agents_finished, stats.agents_stranded
        );
        println!(
            "Transports: {} live, {} spawned, {} expired",
            stats.live_transports, stats.transports_spawned, stats.transports_expired
        );

        if stats.live_agents > 0 {
            println!("--- Active Agents ---");
            for status in self.agent_statuses() {
                println!(
                    "  {}: position={}, steps={}/{}, attempts={}",
                    status.id,
                    status.position,
                    status.success_steps,
                    status.route_len.saturating_sub(1),
                    status.attempts
                );
            }
        }
        println!("Success rate: {:.1}%", stats.success_rate());
    }

    /// Draw the grid in the terminal
    pub fn draw_map(&self) {
        println!("\n=== World Map (tick {}) ===", self.tick);
        println!("Legend: #=Wall, .=Road, S=Agent spawn, T=Transport spawn, F=Finish, A=Agent, v=Transport");
        println!();
        print!("{}", self.render_ascii());
        println!();
    }
}
