use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Shape;

/// Number of rows and columns of the logical grid.
pub const GRID_SIZE: usize = 9;

/// What a position of the logical grid is used for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Not part of the playable board.
    Empty,
    /// Takes ring pieces.
    RingSlot,
    /// Takes connector pieces.
    ConnectorSlot,
}

use CellKind::{ConnectorSlot as C, Empty as E, RingSlot as R};

/// The diamond board, laid out on a square grid.
///
/// Rendering rotates this grid by 45°, so the diamond shows up as an upright
/// square whose corners are the middle cells of the outer rows and columns.
pub static BOARD_MASK: [[CellKind; GRID_SIZE]; GRID_SIZE] = [
    [E, E, E, E, R, E, E, E, E],
    [E, E, E, R, C, R, E, E, E],
    [E, E, R, C, R, C, R, E, E],
    [E, R, C, R, C, R, C, R, E],
    [R, C, R, C, R, C, R, C, R],
    [E, R, C, R, C, R, C, R, E],
    [E, E, R, C, R, C, R, E, E],
    [E, E, E, R, C, R, E, E, E],
    [E, E, E, E, R, E, E, E, E],
];

/// A position on the logical grid, `0 <= row, col < GRID_SIZE`.
///
/// Serialized as a `[row, col]` pair, which is how moves address cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(u8, u8)", into = "(u8, u8)")]
pub struct GridCell {
    pub row: u8,
    pub col: u8,
}

impl CellKind {
    pub fn is_playable(self) -> bool {
        self != CellKind::Empty
    }

    /// The piece shape that fits this kind of cell.
    pub fn shape(self) -> Option<Shape> {
        match self {
            CellKind::Empty => None,
            CellKind::RingSlot => Some(Shape::Ring),
            CellKind::ConnectorSlot => Some(Shape::Connector),
        }
    }
}

impl GridCell {
    /// Returns `None` when the coordinates are outside of the grid.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        if row < GRID_SIZE && col < GRID_SIZE {
            Some(Self {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    /// Cells outside of the grid are [`CellKind::Empty`].
    pub fn kind(self) -> CellKind {
        BOARD_MASK
            .get(self.row as usize)
            .and_then(|row| row.get(self.col as usize))
            .copied()
            .unwrap_or(CellKind::Empty)
    }

    pub fn is_playable(self) -> bool {
        self.kind().is_playable()
    }

    /// All cells of the grid in row-major order, including empty ones.
    pub fn all() -> impl Iterator<Item = GridCell> {
        (0..GRID_SIZE as u8).flat_map(|row| (0..GRID_SIZE as u8).map(move |col| GridCell { row, col }))
    }

    /// All cells that are part of the board, in row-major order.
    pub fn playable() -> impl Iterator<Item = GridCell> {
        Self::all().filter(|cell| cell.is_playable())
    }
}

impl From<(u8, u8)> for GridCell {
    fn from((row, col): (u8, u8)) -> Self {
        Self { row, col }
    }
}

impl From<GridCell> for (u8, u8) {
    fn from(cell: GridCell) -> Self {
        (cell.row, cell.col)
    }
}

/// Formats the cell the way the authority keys its board: `(row, col)`.
impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The error type for the [`FromStr`] instance of [`GridCell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellFromStrErr {
    MissingParentheses,
    NotTwoCoordinates,
    InvalidCoordinate,
    OutsideOfGrid,
}

impl std::error::Error for CellFromStrErr {}

impl std::fmt::Display for CellFromStrErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellFromStrErr::MissingParentheses => write!(f, "cell key is not parenthesized"),
            CellFromStrErr::NotTwoCoordinates => write!(f, "cell key does not have two coordinates"),
            CellFromStrErr::InvalidCoordinate => write!(f, "cell coordinate is not a number"),
            CellFromStrErr::OutsideOfGrid => write!(f, "cell is outside of the grid"),
        }
    }
}

/// Parses board keys such as `"(4, 6)"`. Whitespace around the numbers is ignored.
impl FromStr for GridCell {
    type Err = CellFromStrErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or(CellFromStrErr::MissingParentheses)?;
        let mut parts = inner.split(',');
        let (Some(row), Some(col), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CellFromStrErr::NotTwoCoordinates);
        };
        let row: usize = row
            .trim()
            .parse()
            .map_err(|_| CellFromStrErr::InvalidCoordinate)?;
        let col: usize = col
            .trim()
            .parse()
            .map_err(|_| CellFromStrErr::InvalidCoordinate)?;
        GridCell::new(row, col).ok_or(CellFromStrErr::OutsideOfGrid)
    }
}
