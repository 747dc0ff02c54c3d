//! Board model - 8x8 grid of cells, one per side

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roster::UnitKind;

/// Board width and height
pub const BOARD_SIZE: u8 = 8;
/// Total cells on a board
pub const TOTAL_CELLS: usize = (BOARD_SIZE as usize) * (BOARD_SIZE as usize);
/// Rows each side may deploy into
pub const ZONE_DEPTH: u8 = 3;

/// One of the two participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Host,
    Guest,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Host => Side::Guest,
            Side::Guest => Side::Host,
        }
    }

    /// Whether a row lies inside this side's deployment zone.
    /// Host deploys on rows 0..3, guest on the mirrored rows 5..8.
    pub fn owns_row(self, y: u8) -> bool {
        match self {
            Side::Host => y < ZONE_DEPTH,
            Side::Guest => y >= BOARD_SIZE - ZONE_DEPTH && y < BOARD_SIZE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Host => "Host",
            Side::Guest => "Guest",
        }
    }
}

/// Grid position; `x` is the column, `y` the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    /// Build a coordinate, `None` when outside the board
    pub fn new(x: i32, y: i32) -> Option<Self> {
        let size = i32::from(BOARD_SIZE);
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some(Self {
                x: x as u8,
                y: y as u8,
            })
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.x < BOARD_SIZE && self.y < BOARD_SIZE
    }

    /// Row-major cell index
    pub fn index(&self) -> usize {
        usize::from(self.y) * usize::from(BOARD_SIZE) + usize::from(self.x)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= TOTAL_CELLS {
            return None;
        }
        let size = usize::from(BOARD_SIZE);
        Some(Self {
            x: (index % size) as u8,
            y: (index / size) as u8,
        })
    }

    /// Step by a signed offset, `None` when leaving the board
    pub fn offset(&self, dx: i32, dy: i32) -> Option<Self> {
        Self::new(i32::from(self.x) + dx, i32::from(self.y) + dy)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A deployed unit (mutable, per match)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub hp: i32,
    pub max_hp: i32,
    /// Struck at least once and survived; visible to the attacker
    #[serde(default)]
    pub was_hit: bool,
    /// Has attacked at least once; position visible to the opponent
    #[serde(default)]
    pub revealed_position: bool,
}

impl Unit {
    /// Fresh full-health unit of the given kind
    pub fn new(kind: UnitKind) -> Self {
        let max_hp = kind.archetype().max_hp;
        Self {
            id: Uuid::new_v4(),
            kind,
            hp: max_hp,
            max_hp,
            was_hit: false,
            revealed_position: false,
        }
    }

    pub fn is_damaged(&self) -> bool {
        self.hp < self.max_hp
    }
}

/// Board cell. Serialized as `null` or a unit object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Unit>", into = "Option<Unit>")]
pub enum Cell {
    #[default]
    Empty,
    Occupied(Unit),
}

impl Cell {
    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(unit) => Some(unit),
        }
    }

    pub fn unit_mut(&mut self) -> Option<&mut Unit> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(unit) => Some(unit),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Remove and return the unit, leaving the cell empty
    pub fn take(&mut self) -> Option<Unit> {
        match std::mem::take(self) {
            Cell::Empty => None,
            Cell::Occupied(unit) => Some(unit),
        }
    }
}

impl From<Option<Unit>> for Cell {
    fn from(value: Option<Unit>) -> Self {
        value.map_or(Cell::Empty, Cell::Occupied)
    }
}

impl From<Cell> for Option<Unit> {
    fn from(value: Cell) -> Self {
        match value {
            Cell::Empty => None,
            Cell::Occupied(unit) => Some(unit),
        }
    }
}

/// Fixed 64-cell board in row-major order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Cell>", into = "Vec<Cell>")]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: vec![Cell::Empty; TOTAL_CELLS],
        }
    }

    pub fn get(&self, at: Coord) -> Option<&Cell> {
        if !at.is_valid() {
            return None;
        }
        self.cells.get(at.index())
    }

    pub fn get_mut(&mut self, at: Coord) -> Option<&mut Cell> {
        if !at.is_valid() {
            return None;
        }
        self.cells.get_mut(at.index())
    }

    pub fn unit_at(&self, at: Coord) -> Option<&Unit> {
        self.get(at).and_then(Cell::unit)
    }

    pub fn unit_at_mut(&mut self, at: Coord) -> Option<&mut Unit> {
        self.get_mut(at).and_then(Cell::unit_mut)
    }

    /// Place a unit on an empty cell. Returns the unit back if the cell is
    /// taken or off the board.
    pub fn place(&mut self, at: Coord, unit: Unit) -> Result<(), Unit> {
        match self.get_mut(at) {
            Some(cell) if cell.is_empty() => {
                *cell = Cell::Occupied(unit);
                Ok(())
            }
            _ => Err(unit),
        }
    }

    pub fn take(&mut self, at: Coord) -> Option<Unit> {
        self.get_mut(at).and_then(Cell::take)
    }

    /// Occupied cells with their coordinates, ascending by index
    pub fn units(&self) -> impl Iterator<Item = (Coord, &Unit)> + '_ {
        self.cells.iter().enumerate().filter_map(|(index, cell)| {
            let unit = cell.unit()?;
            Coord::from_index(index).map(|at| (at, unit))
        })
    }

    pub fn unit_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    pub fn has_commander(&self) -> bool {
        self.units().any(|(_, u)| u.kind == UnitKind::Commander)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

/// Rejected board shape when decoding a stored snapshot
#[derive(Debug, thiserror::Error)]
#[error("board must have 64 cells, got {0}")]
pub struct BoardShapeError(pub usize);

impl TryFrom<Vec<Cell>> for Board {
    type Error = BoardShapeError;

    fn try_from(cells: Vec<Cell>) -> Result<Self, Self::Error> {
        if cells.len() != TOTAL_CELLS {
            return Err(BoardShapeError(cells.len()));
        }
        Ok(Self { cells })
    }
}

impl From<Board> for Vec<Cell> {
    fn from(board: Board) -> Self {
        board.cells
    }
}
