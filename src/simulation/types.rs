//! Core types for the grid traffic simulation
//!
//! Coordinates, directions, cell types and entity identifiers shared by every
//! other module.

use std::fmt;

/// A position on the grid. `x` is the column and `y` is the row of the
/// row-major input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring coordinate one step in `direction`.
    /// May lie outside the grid; callers bounds-check through the grid.
    pub fn step(self, direction: Direction) -> Coordinate {
        let (dx, dy) = direction.delta();
        Coordinate::new(self.x + dx, self.y + dy)
    }

    /// Direction from `self` to an orthogonally adjacent `other`
    pub fn direction_to(self, other: Coordinate) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|direction| self.step(*direction) == other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Facing direction of a traffic member.
///
/// The delta table below is the only one in the crate: routing expands
/// neighbours with it and transports move with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Fixed expansion order. Breadth-first search relies on it to pick
    /// between equally short routes.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Static type of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Road,
    Wall,
    /// An agent is created here when the world is built
    AgentSpawn,
    /// Transports appear here at random
    TransportSpawn,
    /// Agents standing here are harvested at the start of the next tick
    Finish,
    Unknown,
}

impl CellType {
    /// Every tag, used to size the per-type registry
    pub const ALL: [CellType; 6] = [
        CellType::Road,
        CellType::Wall,
        CellType::AgentSpawn,
        CellType::TransportSpawn,
        CellType::Finish,
        CellType::Unknown,
    ];

    /// Map a loader code to a cell type. Unrecognised codes become `Unknown`;
    /// grid construction refuses them.
    pub fn from_code(code: u8) -> CellType {
        match code {
            0 => CellType::Road,
            1 => CellType::Wall,
            2 => CellType::AgentSpawn,
            3 => CellType::TransportSpawn,
            4 => CellType::Finish,
            _ => CellType::Unknown,
        }
    }

    pub fn is_passable(self) -> bool {
        self != CellType::Wall
    }

    pub(crate) fn index(self) -> usize {
        match self {
            CellType::Road => 0,
            CellType::Wall => 1,
            CellType::AgentSpawn => 2,
            CellType::TransportSpawn => 3,
            CellType::Finish => 4,
            CellType::Unknown => 5,
        }
    }

    /// Terminal glyph used by the ASCII renderer
    pub fn glyph(self) -> char {
        match self {
            CellType::Road => '.',
            CellType::Wall => '#',
            CellType::AgentSpawn => 'S',
            CellType::TransportSpawn => 'T',
            CellType::Finish => 'F',
            CellType::Unknown => '?',
        }
    }
}

/// A unique identifier for simulation entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for agent IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub SimId);

/// A wrapper type for transport IDs. Ordering follows spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub SimId);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0 .0)
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport#{}", self.0 .0)
    }
}

/// What sits in a cell's occupant slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupant {
    Agent(AgentId),
    Transport(TransportId),
}

impl Occupant {
    pub fn kind(self) -> OccupantKind {
        match self {
            Occupant::Agent(_) => OccupantKind::Agent,
            Occupant::Transport(_) => OccupantKind::Transport,
        }
    }
}

/// Occupant kind as seen by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccupantKind {
    Agent,
    Transport,
}

impl OccupantKind {
    pub fn glyph(self) -> char {
        match self {
            OccupantKind::Agent => 'A',
            OccupantKind::Transport => 'v',
        }
    }
}

/// Read-only snapshot of one cell for drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub cell_type: CellType,
    pub occupant: Option<OccupantKind>,
}

impl CellView {
    pub fn glyph(&self) -> char {
        match self.occupant {
            Some(kind) => kind.glyph(),
            None => self.cell_type.glyph(),
        }
    }
}
