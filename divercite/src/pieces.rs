use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The color of a piece.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PieceColor {
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "G")]
    Green,
    #[serde(rename = "B")]
    Blue,
    #[serde(rename = "Y")]
    Yellow,
}

/// The shape of a piece, which also decides on which kind of cell it goes.
///
/// The variant order is the order in which shapes appear in a tray.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Shape {
    #[serde(rename = "C")]
    Connector,
    #[serde(rename = "R")]
    Ring,
}

/// The two players, named after the piece type the authority assigns them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "W")]
    White,
    #[serde(rename = "B")]
    Black,
}

/// An inventory key: a color and a shape, without an owner.
///
/// Serialized as the two-letter code used by the authority, e.g. `"RC"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceKind {
    pub color: PieceColor,
    pub shape: Shape,
}

/// A piece as it appears on the board.
///
/// Connectors are drawn differently depending on who owns them, rings are not.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Piece {
    Ring(PieceColor),
    Connector(PieceColor, Side),
}

pub const RINGS_PER_COLOR: u8 = 3;
pub const CONNECTORS_PER_COLOR: u8 = 2;

impl PieceColor {
    pub const ALL: [PieceColor; 4] = [
        PieceColor::Red,
        PieceColor::Green,
        PieceColor::Blue,
        PieceColor::Yellow,
    ];

    pub fn letter(self) -> char {
        match self {
            PieceColor::Red => 'R',
            PieceColor::Green => 'G',
            PieceColor::Blue => 'B',
            PieceColor::Yellow => 'Y',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'R' => Some(PieceColor::Red),
            'G' => Some(PieceColor::Green),
            'B' => Some(PieceColor::Blue),
            'Y' => Some(PieceColor::Yellow),
            _ => None,
        }
    }
}

impl Shape {
    pub fn letter(self) -> char {
        match self {
            Shape::Connector => 'C',
            Shape::Ring => 'R',
        }
    }

    /// How many pieces of this shape a player starts with, per color.
    pub fn initial_count(self) -> u8 {
        match self {
            Shape::Connector => CONNECTORS_PER_COLOR,
            Shape::Ring => RINGS_PER_COLOR,
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'C' => Some(Shape::Connector),
            'R' => Some(Shape::Ring),
            _ => None,
        }
    }
}

impl Side {
    pub const ALL: [Side; 2] = [Side::White, Side::Black];

    pub fn letter(self) -> char {
        match self {
            Side::White => 'W',
            Side::Black => 'B',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'W' => Some(Side::White),
            'B' => Some(Side::Black),
            _ => None,
        }
    }
}

impl PieceKind {
    /// Every kind, in the order used by the tray layout.
    pub const ALL: [PieceKind; 8] = {
        use PieceColor::*;
        use Shape::*;
        [
            PieceKind { color: Red, shape: Connector },
            PieceKind { color: Red, shape: Ring },
            PieceKind { color: Green, shape: Connector },
            PieceKind { color: Green, shape: Ring },
            PieceKind { color: Blue, shape: Connector },
            PieceKind { color: Blue, shape: Ring },
            PieceKind { color: Yellow, shape: Connector },
            PieceKind { color: Yellow, shape: Ring },
        ]
    };

    pub fn new(color: PieceColor, shape: Shape) -> Self {
        Self { color, shape }
    }

    /// The piece that a player on `side` puts on the board when playing this kind.
    pub fn played_by(self, side: Side) -> Piece {
        match self.shape {
            Shape::Ring => Piece::Ring(self.color),
            Shape::Connector => Piece::Connector(self.color, side),
        }
    }
}

impl Piece {
    pub fn kind(self) -> PieceKind {
        match self {
            Piece::Ring(color) => PieceKind::new(color, Shape::Ring),
            Piece::Connector(color, _) => PieceKind::new(color, Shape::Connector),
        }
    }

    pub fn color(self) -> PieceColor {
        self.kind().color
    }

    pub fn shape(self) -> Shape {
        self.kind().shape
    }

    /// The side a connector is drawn for. Always `None` for rings.
    pub fn side(self) -> Option<Side> {
        match self {
            Piece::Ring(_) => None,
            Piece::Connector(_, side) => Some(side),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl std::fmt::Display for PieceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.color.letter(), self.shape.letter())
    }
}

/// Uses the sprite naming of the assets: `RR` for a red ring, `RCW` for a
/// red connector owned by white.
impl std::fmt::Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Piece::Ring(color) => write!(f, "{}R", color.letter()),
            Piece::Connector(color, side) => write!(f, "{}C{}", color.letter(), side.letter()),
        }
    }
}

/// The error type for the [`FromStr`] instances of the piece types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PieceFromStrErr {
    WrongLength,
    InvalidColor(char),
    InvalidShape(char),
    InvalidSide(char),
    ConnectorWithoutSide,
}

impl std::error::Error for PieceFromStrErr {}

impl std::fmt::Display for PieceFromStrErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PieceFromStrErr::WrongLength => write!(f, "piece code has the wrong length"),
            PieceFromStrErr::InvalidColor(c) => write!(f, "'{}' is not a piece color", c),
            PieceFromStrErr::InvalidShape(c) => write!(f, "'{}' is not a piece shape", c),
            PieceFromStrErr::InvalidSide(c) => write!(f, "'{}' is not a player side", c),
            PieceFromStrErr::ConnectorWithoutSide => {
                write!(f, "connector piece code does not name its side")
            }
        }
    }
}

impl FromStr for Side {
    type Err = PieceFromStrErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let c = chars.next().ok_or(PieceFromStrErr::WrongLength)?;
        if chars.next().is_some() {
            return Err(PieceFromStrErr::WrongLength);
        }
        Side::from_letter(c).ok_or(PieceFromStrErr::InvalidSide(c))
    }
}

impl FromStr for PieceKind {
    type Err = PieceFromStrErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let color_char = chars.next().ok_or(PieceFromStrErr::WrongLength)?;
        let shape_char = chars.next().ok_or(PieceFromStrErr::WrongLength)?;
        if chars.next().is_some() {
            return Err(PieceFromStrErr::WrongLength);
        }
        let color =
            PieceColor::from_letter(color_char).ok_or(PieceFromStrErr::InvalidColor(color_char))?;
        let shape =
            Shape::from_letter(shape_char).ok_or(PieceFromStrErr::InvalidShape(shape_char))?;
        Ok(PieceKind { color, shape })
    }
}

/// Parses the authority's `piece_type` strings.
///
/// A ring may carry a trailing side letter, which is checked and discarded.
/// A connector must carry one.
impl FromStr for Piece {
    type Err = PieceFromStrErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() > 3 {
            return Err(PieceFromStrErr::WrongLength);
        }
        let split = s.char_indices().nth(2).map_or(s.len(), |(idx, _)| idx);
        let kind: PieceKind = s[..split].parse()?;
        let side = match s[split..].chars().next() {
            Some(c) => Some(Side::from_letter(c).ok_or(PieceFromStrErr::InvalidSide(c))?),
            None => None,
        };
        match (kind.shape, side) {
            (Shape::Ring, _) => Ok(Piece::Ring(kind.color)),
            (Shape::Connector, Some(side)) => Ok(Piece::Connector(kind.color, side)),
            (Shape::Connector, None) => Err(PieceFromStrErr::ConnectorWithoutSide),
        }
    }
}

impl Serialize for PieceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PieceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Piece {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Piece {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// Shorthand for creating piece kinds from their two-letter code.
///
/// ```
/// # use divercite::{kind, PieceColor, PieceKind, Shape};
/// assert_eq!(
///     kind!("GC"),
///     PieceKind { color: PieceColor::Green, shape: Shape::Connector }
/// );
/// ```
#[macro_export]
macro_rules! kind {
    ($code:literal) => {
        <$crate::PieceKind as std::str::FromStr>::from_str($code)
            .expect("Invalid piece kind given to kind! macro")
    };
}

/// Shorthand for creating board pieces from their sprite code, e.g. `piece!("YCB")`.
#[macro_export]
macro_rules! piece {
    ($code:literal) => {
        <$crate::Piece as std::str::FromStr>::from_str($code)
            .expect("Invalid piece code given to piece! macro")
    };
}
// The import is for using the macros in other modules, see https://stackoverflow.com/a/31749071/1726797
#[allow(unused_imports)]
pub(crate) use {kind, piece};
