//! Agent worker threads and the per-tick step barrier
//!
//! Every live agent runs on its own thread. The thread parks on a command
//! channel, takes one step under the grid lock when told to, reports back,
//! and parks again. `step_all` fans the step command out to every worker and
//! waits until each one has reported. Grid mutation stays serialized by the
//! single mutex; only the waiting happens in parallel.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::agent::{AgentStep, SimAgent};
use super::error::{SimError, SimResult};
use super::grid::Grid;
use super::types::{AgentId, Coordinate};

/// Lock the shared grid, turning poisoning into an error
pub(crate) fn lock_grid(grid: &Mutex<Grid>) -> SimResult<MutexGuard<'_, Grid>> {
    grid.lock().map_err(|_| SimError::GridPoisoned)
}

/// Message from the orchestrator to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Step,
    Stop,
}

/// Message from a worker after it has taken its step
#[derive(Debug)]
pub struct StepReport {
    pub id: AgentId,
    pub outcome: SimResult<AgentStep>,
    pub position: Coordinate,
    pub success_steps: usize,
    pub attempts: usize,
}

/// Orchestrator-side view of a live agent, refreshed after every barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub id: AgentId,
    pub spawn: Coordinate,
    pub position: Coordinate,
    /// Route end chosen at spawn
    pub destination: Coordinate,
    pub route_len: usize,
    pub success_steps: usize,
    pub attempts: usize,
}

impl AgentStatus {
    fn from_agent(agent: &SimAgent) -> Self {
        Self {
            id: agent.id,
            spawn: agent.spawn,
            position: agent.position(),
            destination: agent.route().last().copied().unwrap_or(agent.spawn),
            route_len: agent.route().len(),
            success_steps: agent.success_steps(),
            attempts: agent.attempts(),
        }
    }
}

struct AgentWorker {
    commands: Sender<WorkerCommand>,
    handle: JoinHandle<SimAgent>,
}

fn run_worker(
    mut agent: SimAgent,
    grid: Arc<Mutex<Grid>>,
    commands: Receiver<WorkerCommand>,
    reports: Sender<StepReport>,
) -> SimAgent {
    // A closed command channel means the pool is gone; treat it as Stop
    while let Ok(WorkerCommand::Step) = commands.recv() {
        let outcome = match lock_grid(&grid) {
            Ok(mut grid) => agent.step(&mut grid),
            Err(e) => Err(e),
        };

        let report = StepReport {
            id: agent.id,
            outcome,
            position: agent.position(),
            success_steps: agent.success_steps(),
            attempts: agent.attempts(),
        };
        if reports.send(report).is_err() {
            break;
        }
    }
    agent
}

/// All live agent workers
pub struct AgentPool {
    grid: Arc<Mutex<Grid>>,
    workers: BTreeMap<AgentId, AgentWorker>,
    statuses: BTreeMap<AgentId, AgentStatus>,
    report_tx: Sender<StepReport>,
    report_rx: Receiver<StepReport>,
    /// Set by the first failed barrier. Late reports from that barrier may
    /// still be queued, so no further barrier can be trusted.
    failed: bool,
}

impl AgentPool {
    pub fn new(grid: Arc<Mutex<Grid>>) -> Self {
        let (report_tx, report_rx) = unbounded();
        Self {
            grid,
            workers: BTreeMap::new(),
            statuses: BTreeMap::new(),
            report_tx,
            report_rx,
            failed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.workers.contains_key(&id)
    }

    /// True once a barrier has failed; every later `step_all` is refused
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn status(&self, id: AgentId) -> Option<&AgentStatus> {
        self.statuses.get(&id)
    }

    pub fn statuses(&self) -> impl Iterator<Item = &AgentStatus> {
        self.statuses.values()
    }

    /// Start a worker thread for an agent that already occupies its cell
    pub fn spawn(&mut self, agent: SimAgent) -> SimResult<()> {
        let id = agent.id;
        let (commands, command_rx) = unbounded();
        let grid = Arc::clone(&self.grid);
        let reports = self.report_tx.clone();

        let status = AgentStatus::from_agent(&agent);
        let handle = thread::Builder::new()
            .name(id.to_string())
            .spawn(move || run_worker(agent, grid, command_rx, reports))?;

        self.statuses.insert(id, status);
        self.workers.insert(id, AgentWorker { commands, handle });
        Ok(())
    }

    /// Barrier: tell every worker to step, then wait for every report.
    ///
    /// Fails when the deadline passes, a worker disappears or a step errors.
    /// Any failure is fatal: the pool refuses every later barrier with
    /// [`SimError::Halted`].
    pub fn step_all(&mut self, timeout: Duration) -> SimResult<Vec<(AgentId, AgentStep)>> {
        if self.failed {
            return Err(SimError::Halted);
        }

        let result = self.run_barrier(timeout);
        if let Err(e) = &result {
            debug!("Agent barrier failed: {}", e);
            self.failed = true;
        }
        result
    }

    fn run_barrier(&mut self, timeout: Duration) -> SimResult<Vec<(AgentId, AgentStep)>> {
        let deadline = Instant::now() + timeout;
        let mut pending: BTreeSet<AgentId> = BTreeSet::new();

        for (id, worker) in &self.workers {
            worker
                .commands
                .send(WorkerCommand::Step)
                .map_err(|_| SimError::WorkerDisconnected(*id))?;
            pending.insert(*id);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let report = match self.report_rx.recv_timeout(remaining) {
                Ok(report) => report,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return Err(self.barrier_failure(&pending, timeout));
                }
            };

            if !pending.remove(&report.id) {
                return Err(SimError::UnexpectedReport(report.id));
            }

            let step = report.outcome?;
            if let Some(status) = self.statuses.get_mut(&report.id) {
                status.position = report.position;
                status.success_steps = report.success_steps;
                status.attempts = report.attempts;
            }
            outcomes.push((report.id, step));
        }

        Ok(outcomes)
    }

    /// Work out why the barrier did not complete
    fn barrier_failure(&self, pending: &BTreeSet<AgentId>, timeout: Duration) -> SimError {
        for id in pending {
            if let Some(worker) = self.workers.get(id) {
                if worker.handle.is_finished() {
                    return SimError::WorkerPanicked(*id);
                }
            }
        }
        SimError::BarrierTimeout {
            waiting: pending.len(),
            timeout,
        }
    }

    /// Stop an agent's worker and hand the agent back
    pub fn despawn(&mut self, id: AgentId) -> SimResult<SimAgent> {
        let worker = self
            .workers
            .remove(&id)
            .ok_or(SimError::WorkerDisconnected(id))?;
        self.statuses.remove(&id);

        // The worker may already be gone; join reports that case
        let _ = worker.commands.send(WorkerCommand::Stop);
        worker
            .handle
            .join()
            .map_err(|_| SimError::WorkerPanicked(id))
    }

    /// Stop and join every worker
    pub fn shutdown(&mut self) {
        let ids: Vec<AgentId> = self.workers.keys().copied().collect();
        for id in ids {
            match self.despawn(id) {
                Ok(agent) => debug!("Stopped worker for {} at {}", id, agent.position()),
                Err(e) => warn!("Worker for {} did not stop cleanly: {}", id, e),
            }
        }
    }
}

impl Drop for AgentPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
