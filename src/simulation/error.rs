//! Simulation error type.

use std::time::Duration;

use thiserror::Error;

use super::types::{AgentId, Coordinate};

/// Errors produced by the simulation core.
///
/// Blocked moves, occupied spawn cells and expired transports are ordinary
/// outcomes and never appear here.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("grid has no cells")]
    EmptyGrid,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid cell code {code} at ({x}, {y})")]
    InvalidCellCode { x: usize, y: usize, code: u8 },

    #[error("invalid map character '{ch}' at line {line}, column {column}")]
    InvalidMapChar { line: usize, column: usize, ch: char },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("simulation configuration error: {0}")]
    InvalidConfig(String),

    #[error("coordinate {0} is outside the grid")]
    OutOfBounds(Coordinate),

    #[error("cell {0} is already occupied")]
    CellOccupied(Coordinate),

    #[error("cell {0} has no occupant")]
    CellEmpty(Coordinate),

    #[error("{waiting} agent worker(s) did not report within {timeout:?}")]
    BarrierTimeout { waiting: usize, timeout: Duration },

    #[error("worker for {0} disconnected")]
    WorkerDisconnected(AgentId),

    #[error("worker for {0} panicked")]
    WorkerPanicked(AgentId),

    #[error("unexpected step report from {0}")]
    UnexpectedReport(AgentId),

    #[error("grid lock poisoned by a panicking worker")]
    GridPoisoned,

    #[error("simulation halted after a fatal error")]
    Halted,
}

pub type SimResult<T> = Result<T, SimError>;
