//! Grid of cells with static types and a single occupant slot each
//!
//! The grid has no locking of its own. The world shares it behind one mutex
//! and every occupancy read-decide-write happens while holding it.

use super::error::{SimError, SimResult};
use super::map::parse_map;
use super::types::{CellType, CellView, Coordinate, Direction, Occupant};

/// One grid cell
#[derive(Debug, Clone)]
pub struct Cell {
    pub coord: Coordinate,
    pub cell_type: CellType,
    occupant: Option<Occupant>,
}

impl Cell {
    fn new(coord: Coordinate, cell_type: CellType) -> Self {
        Self {
            coord,
            cell_type,
            occupant: None,
        }
    }

    pub fn occupant(&self) -> Option<Occupant> {
        self.occupant
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    /// Row-major: index is `y * width + x`
    cells: Vec<Cell>,
    /// Coordinates of each cell type in row-major order, filled once
    registry: [Vec<Coordinate>; 6],
}

impl Grid {
    /// Build a grid from loader codes. `rows[y][x]` becomes cell `(x, y)`.
    pub fn from_codes(rows: &[Vec<u8>]) -> SimResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(SimError::EmptyGrid);
        }

        let mut cells = Vec::with_capacity(width * height);
        let mut registry: [Vec<Coordinate>; 6] = Default::default();

        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(SimError::RaggedRow {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            for (x, &code) in row.iter().enumerate() {
                let cell_type = CellType::from_code(code);
                if cell_type == CellType::Unknown {
                    return Err(SimError::InvalidCellCode { x, y, code });
                }
                let coord = Coordinate::new(x as i32, y as i32);
                registry[cell_type.index()].push(coord);
                cells.push(Cell::new(coord, cell_type));
            }
        }

        Ok(Self {
            width,
            height,
            cells,
            registry,
        })
    }

    /// Parse a text map and build the grid from it
    pub fn from_map_str(text: &str) -> SimResult<Self> {
        Self::from_codes(&parse_map(text)?)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        self.index_of(coord).is_some()
    }

    fn index_of(&self, coord: Coordinate) -> Option<usize> {
        let x = usize::try_from(coord.x).ok()?;
        let y = usize::try_from(coord.y).ok()?;
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    pub fn cell(&self, coord: Coordinate) -> Option<&Cell> {
        self.index_of(coord).map(|index| &self.cells[index])
    }

    fn cell_mut(&mut self, coord: Coordinate) -> SimResult<&mut Cell> {
        let index = self.index_of(coord).ok_or(SimError::OutOfBounds(coord))?;
        Ok(&mut self.cells[index])
    }

    pub fn cell_type(&self, coord: Coordinate) -> Option<CellType> {
        self.cell(coord).map(|cell| cell.cell_type)
    }

    /// In bounds and not a wall
    pub fn is_passable(&self, coord: Coordinate) -> bool {
        self.cell_type(coord).is_some_and(CellType::is_passable)
    }

    pub fn occupant(&self, coord: Coordinate) -> Option<Occupant> {
        self.cell(coord).and_then(Cell::occupant)
    }

    pub fn is_occupied(&self, coord: Coordinate) -> bool {
        self.occupant(coord).is_some()
    }

    pub fn view(&self, coord: Coordinate) -> Option<CellView> {
        self.cell(coord).map(|cell| CellView {
            cell_type: cell.cell_type,
            occupant: cell.occupant.map(Occupant::kind),
        })
    }

    /// Put an occupant into an empty cell
    pub fn place(&mut self, coord: Coordinate, occupant: Occupant) -> SimResult<()> {
        let cell = self.cell_mut(coord)?;
        if cell.occupant.is_some() {
            return Err(SimError::CellOccupied(coord));
        }
        cell.occupant = Some(occupant);
        Ok(())
    }

    /// Empty a cell, returning whatever was in it
    pub fn clear(&mut self, coord: Coordinate) -> Option<Occupant> {
        let index = self.index_of(coord)?;
        self.cells[index].occupant.take()
    }

    /// Move the occupant of `from` into `to`.
    ///
    /// Both cells are checked before either is touched, so a failed move
    /// leaves the grid unchanged.
    pub fn move_occupant(&mut self, from: Coordinate, to: Coordinate) -> SimResult<()> {
        let from_index = self.index_of(from).ok_or(SimError::OutOfBounds(from))?;
        let to_index = self.index_of(to).ok_or(SimError::OutOfBounds(to))?;
        if self.cells[to_index].occupant.is_some() {
            return Err(SimError::CellOccupied(to));
        }
        let occupant = self.cells[from_index]
            .occupant
            .take()
            .ok_or(SimError::CellEmpty(from))?;
        self.cells[to_index].occupant = Some(occupant);
        Ok(())
    }

    /// Directions leading to an in-bounds, non-wall neighbour, in
    /// [`Direction::ALL`] order
    pub fn passable_directions(&self, coord: Coordinate) -> Vec<Direction> {
        Direction::ALL
            .into_iter()
            .filter(|direction| self.is_passable(coord.step(*direction)))
            .collect()
    }

    /// All coordinates of a given cell type in row-major order
    pub fn coords_of(&self, cell_type: CellType) -> &[Coordinate] {
        &self.registry[cell_type.index()]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_occupied()).count()
    }
}
