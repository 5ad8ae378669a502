use crate::{CellFromStrErr, GridCell, PieceFromStrErr, Side};

/// The error type for turning raw records from the authority into snapshots.
///
/// These never abort playback: a record that fails to convert is dropped.
#[derive(Debug)]
pub enum FormatError {
    /// The payload is not valid JSON, or a required field is missing or has the wrong type.
    Json(serde_json::Error),
    /// A recorded game must be a list of records.
    NotAList,
    InvalidCellKey {
        key: String,
        err: CellFromStrErr,
    },
    /// The cell is on the grid, but not part of the board.
    CellOffBoard(GridCell),
    InvalidPieceType {
        piece_type: String,
        err: PieceFromStrErr,
    },
    InvalidSide {
        piece_type: String,
    },
    MissingScore {
        player_id: String,
    },
    MissingPieceCounts {
        player_id: String,
    },
    InvalidPieceCountKey {
        player_id: String,
        key: String,
    },
    MissingPieceCount {
        player_id: String,
        kind: String,
    },
    DuplicateSide(Side),
    MissingSide(Side),
    /// A final score list without any entries.
    NoScores,
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Json(err) => Some(err),
            FormatError::InvalidCellKey { err, .. } => Some(err),
            FormatError::InvalidPieceType { err, .. } => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Json(err) => write!(f, "Malformed record: {}", err),
            FormatError::NotAList => write!(f, "A recorded game must be a JSON list of records"),
            FormatError::InvalidCellKey { key, .. } => {
                write!(f, "Board key '{}' does not name a cell", key)
            }
            FormatError::CellOffBoard(cell) => {
                write!(f, "Cell {} is not part of the board", cell)
            }
            FormatError::InvalidPieceType { piece_type, .. } => {
                write!(f, "Unknown piece type '{}'", piece_type)
            }
            FormatError::InvalidSide { piece_type } => {
                write!(f, "Player piece type '{}' is neither 'W' nor 'B'", piece_type)
            }
            FormatError::MissingScore { player_id } => {
                write!(f, "No score for player {}", player_id)
            }
            FormatError::MissingPieceCounts { player_id } => {
                write!(f, "No remaining piece counts for player {}", player_id)
            }
            FormatError::InvalidPieceCountKey { player_id, key } => write!(
                f,
                "Remaining piece counts of player {} use an unknown key '{}'",
                player_id, key
            ),
            FormatError::MissingPieceCount { player_id, kind } => write!(
                f,
                "Remaining piece counts of player {} lack an entry for {}",
                player_id, kind
            ),
            FormatError::DuplicateSide(side) => {
                write!(f, "More than one player plays side {}", side)
            }
            FormatError::MissingSide(side) => write!(f, "No player plays side {}", side),
            FormatError::NoScores => write!(f, "The final scores are empty"),
        }
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        FormatError::Json(err)
    }
}

/// The error type for [`BoardLayout::new()`](crate::BoardLayout::new).
#[derive(Debug, PartialEq)]
pub enum LayoutError {
    NonPositiveCellSize,
    /// Neighbouring hit circles would touch or overlap.
    NonPositiveMargin,
    NonFiniteValue,
}

impl std::error::Error for LayoutError {}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::NonPositiveCellSize => write!(f, "The cell size must be positive"),
            LayoutError::NonPositiveMargin => write!(
                f,
                "The margin between pieces must be positive, or cells would overlap"
            ),
            LayoutError::NonFiniteValue => write!(f, "Layout values must be finite"),
        }
    }
}
