use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};

use crate::{GridCell, LayoutError, PieceKind, PlayerState, GRID_SIZE};

/// Fraction of the canvas width left free on each side of the board.
pub const BOARD_MARGIN_RATIO: f64 = 0.12;
/// Fraction of the canvas width between two neighbouring pieces.
pub const INTER_PIECE_MARGIN_RATIO: f64 = 0.032;
/// Vertical gap between two rows of a piece tray, in screen units.
pub const TRAY_ROW_GAP: f64 = 20.0;

/// A position on a drawing surface. `y` grows downwards.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Rotates this point by `angle` radians (clockwise on screen) around `pivot`.
    fn rotated(self, pivot: ScreenPoint, angle: f64) -> ScreenPoint {
        let (sin, cos) = angle.sin_cos();
        let (dx, dy) = (self.x - pivot.x, self.y - pivot.y);
        ScreenPoint {
            x: pivot.x + dx * cos - dy * sin,
            y: pivot.y + dx * sin + dy * cos,
        }
    }
}

/// Maps between grid cells and positions on the board canvas.
///
/// The logical grid is drawn rotated by 45° around the canvas center, so
/// the diamond of playable cells shows up as an upright square.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoardLayout {
    cell_size: f64,
    inter_piece_margin: f64,
    center: ScreenPoint,
}

impl BoardLayout {
    /// The hit circle of a cell has a diameter of `cell_size`, and cell
    /// centers are `cell_size + inter_piece_margin` apart, so a positive
    /// margin keeps hit circles from overlapping.
    pub fn new(
        cell_size: f64,
        inter_piece_margin: f64,
        center: ScreenPoint,
    ) -> Result<Self, LayoutError> {
        if ![cell_size, inter_piece_margin, center.x, center.y]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(LayoutError::NonFiniteValue);
        }
        if cell_size <= 0.0 {
            return Err(LayoutError::NonPositiveCellSize);
        }
        if inter_piece_margin <= 0.0 {
            return Err(LayoutError::NonPositiveMargin);
        }
        Ok(Self {
            cell_size,
            inter_piece_margin,
            center,
        })
    }

    /// The standard layout for a canvas of the given size.
    pub fn for_canvas(width: f64, height: f64) -> Result<Self, LayoutError> {
        let margin = BOARD_MARGIN_RATIO * width;
        let cell_size = (width - 2.0 * margin) / GRID_SIZE as f64;
        Self::new(
            cell_size,
            INTER_PIECE_MARGIN_RATIO * width,
            ScreenPoint::new(width / 2.0, height / 2.0),
        )
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn center(&self) -> ScreenPoint {
        self.center
    }

    /// Distance between the centers of two neighbouring cells.
    pub fn spacing(&self) -> f64 {
        self.cell_size + self.inter_piece_margin
    }

    pub fn cell_center(&self, cell: GridCell) -> ScreenPoint {
        let middle = (GRID_SIZE / 2) as f64;
        let unrotated = ScreenPoint {
            x: self.center.x + (cell.col as f64 - middle) * self.spacing(),
            y: self.center.y + (cell.row as f64 - middle) * self.spacing(),
        };
        unrotated.rotated(self.center, FRAC_PI_4)
    }

    /// The playable cell whose hit circle contains `point`, if any.
    pub fn hit_test_cell(&self, point: ScreenPoint) -> Option<GridCell> {
        // Undo the rotation to find the nearest grid position. At most one
        // hit circle can contain the point, and it has to be this one.
        let unrotated = point.rotated(self.center, -FRAC_PI_4);
        let middle = (GRID_SIZE / 2) as f64;
        let col = ((unrotated.x - self.center.x) / self.spacing() + middle).round();
        let row = ((unrotated.y - self.center.y) / self.spacing() + middle).round();
        if row < 0.0 || col < 0.0 {
            return None;
        }
        let cell = GridCell::new(row as usize, col as usize)?;
        if point.distance(self.cell_center(cell)) < self.cell_size / 2.0 && cell.is_playable() {
            Some(cell)
        } else {
            None
        }
    }
}

/// The size of a player's inventory panel, and of the icons inside it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrayGeometry {
    pub width: f64,
    pub height: f64,
    pub cell_size: f64,
    pub row_gap: f64,
}

impl TrayGeometry {
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        Self {
            width,
            height,
            cell_size,
            row_gap: TRAY_ROW_GAP,
        }
    }
}

/// Where each piece icon of one player's inventory panel is centered.
///
/// A layout is only meaningful for the snapshot it was computed from, which
/// is why the renderer hands it out together with the icons it drew.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrayLayout {
    slots: BTreeMap<PieceKind, ScreenPoint>,
    radius: f64,
}

impl TrayLayout {
    pub fn get(&self, kind: PieceKind) -> Option<ScreenPoint> {
        self.slots.get(&kind).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PieceKind, ScreenPoint)> + '_ {
        self.slots.iter().map(|(&kind, &point)| (kind, point))
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

/// Lays out the icons of `player`'s inventory, two per row.
pub fn layout_piece_tray(player: &PlayerState, geometry: &TrayGeometry) -> TrayLayout {
    let TrayGeometry {
        width,
        height,
        cell_size,
        row_gap,
    } = *geometry;
    let mut slots = BTreeMap::new();
    let mut x = width / 5.0;
    let mut y = height / 4.0;
    for (i, &kind) in player.pieces_left.keys().enumerate() {
        if i % 2 == 0 {
            x = width / 5.0;
            y += cell_size + row_gap;
        }
        slots.insert(
            kind,
            ScreenPoint::new(x + cell_size / 2.0, y + cell_size / 2.0),
        );
        x += cell_size * 3.0;
    }
    TrayLayout {
        slots,
        radius: cell_size / 2.0,
    }
}

/// The piece icon whose hit circle contains `point`, if any.
pub fn hit_test_piece_tray(point: ScreenPoint, tray: &TrayLayout) -> Option<PieceKind> {
    tray.iter()
        .find(|&(_, center)| point.distance(center) < tray.radius)
        .map(|(kind, _)| kind)
}
