use crate::{
    layout_piece_tray, BoardLayout, CellKind, GridCell, Interaction, Piece, PieceKind,
    ScreenPoint, Side, Snapshot, TrayGeometry, TrayLayout, TraySlot,
};

/// A drawing surface: the board canvas, or the inventory panel of one player.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Surface {
    Board,
    Tray(Side),
}

/// An image the front end has to load before it can draw it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sprite {
    Board,
    /// Drawn behind a hovered cell or tray icon.
    PieceBackground,
    Piece(Piece),
}

impl Sprite {
    /// Every sprite a scene can refer to.
    pub fn all() -> impl Iterator<Item = Sprite> {
        let pieces = PieceKind::ALL.into_iter().flat_map(|kind| {
            let mut pieces = vec![kind.played_by(Side::White)];
            if kind.played_by(Side::Black) != pieces[0] {
                pieces.push(kind.played_by(Side::Black));
            }
            pieces
        });
        [Sprite::Board, Sprite::PieceBackground]
            .into_iter()
            .chain(pieces.map(Sprite::Piece))
    }
}

/// Uses the asset file stems.
impl std::fmt::Display for Sprite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sprite::Board => write!(f, "Plateau"),
            Sprite::PieceBackground => write!(f, "piece_bg"),
            Sprite::Piece(piece) => write!(f, "{}", piece),
        }
    }
}

/// One playable cell of the board as it should be drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct CellView {
    pub cell: GridCell,
    pub kind: CellKind,
    pub at: ScreenPoint,
    pub piece: Option<Piece>,
    /// Draw the hover background and a highlight ring.
    pub highlighted: bool,
}

/// One icon of a tray.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotView {
    pub kind: PieceKind,
    pub sprite: Piece,
    pub at: ScreenPoint,
    /// The label next to the icon.
    pub count: u8,
    /// Draw a highlight ring.
    pub selected: bool,
    /// Draw the hover background.
    pub hovered: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrayView {
    pub side: Side,
    pub name: String,
    pub score: u32,
    /// Frame the name, it is this player's turn.
    pub has_turn: bool,
    pub slots: Vec<SlotView>,
    /// The layout the slots were placed with. Hit tests must use this one.
    pub layout: TrayLayout,
}

/// Everything that is drawn for one snapshot.
///
/// A scene is recomputed from scratch on every redraw.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub cells: Vec<CellView>,
    /// Indexed by `Side as usize`.
    pub trays: [TrayView; 2],
    pub cell_size: f64,
    pub icon_size: f64,
    pub board_center: ScreenPoint,
}

/// A single image draw, in the order it has to happen.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub surface: Surface,
    pub sprite: Sprite,
    pub at: ScreenPoint,
    pub size: f64,
    /// Pieces on the board are turned by 45° along with the grid.
    pub rotated: bool,
}

pub fn render(
    snapshot: &Snapshot,
    interaction: &Interaction,
    board: &BoardLayout,
    tray: &TrayGeometry,
) -> Scene {
    let cells = GridCell::playable()
        .map(|cell| CellView {
            cell,
            kind: cell.kind(),
            at: board.cell_center(cell),
            piece: snapshot.occupancy().get(&cell).map(|o| o.piece),
            highlighted: interaction.hovered_cell() == Some(cell),
        })
        .collect();
    let trays = Side::ALL.map(|side| render_tray(snapshot, interaction, side, tray));
    Scene {
        cells,
        trays,
        cell_size: board.cell_size(),
        icon_size: tray.cell_size,
        board_center: board.center(),
    }
}

fn render_tray(
    snapshot: &Snapshot,
    interaction: &Interaction,
    side: Side,
    geometry: &TrayGeometry,
) -> TrayView {
    let player = snapshot.player(side);
    let layout = layout_piece_tray(player, geometry);
    let has_turn = snapshot.is_turn_of(&player.name);
    let selected = if interaction.local_turn(snapshot) == Some(side) {
        interaction.selected_piece()
    } else {
        None
    };
    let slots = layout
        .iter()
        .map(|(kind, at)| SlotView {
            kind,
            sprite: kind.played_by(side),
            at,
            count: player.remaining(kind),
            selected: selected == Some(kind),
            hovered: interaction.hovered_piece() == Some(TraySlot { side, kind }),
        })
        .collect();
    TrayView {
        side,
        name: player.name.clone(),
        score: player.score,
        has_turn,
        slots,
        layout,
    }
}

impl Scene {
    pub fn tray(&self, side: Side) -> &TrayView {
        &self.trays[side as usize]
    }

    /// The image draws of this scene. Text, frames and rings are left to the
    /// front end, which finds them in the views.
    pub fn draw_commands(&self) -> Vec<DrawCommand> {
        let mut commands = vec![DrawCommand {
            surface: Surface::Board,
            sprite: Sprite::Board,
            at: self.board_center,
            size: self.board_center.x * 2.0,
            rotated: false,
        }];
        for view in &self.cells {
            if view.highlighted {
                commands.push(DrawCommand {
                    surface: Surface::Board,
                    sprite: Sprite::PieceBackground,
                    at: view.at,
                    size: self.cell_size,
                    rotated: true,
                });
            }
            if let Some(piece) = view.piece {
                commands.push(DrawCommand {
                    surface: Surface::Board,
                    sprite: Sprite::Piece(piece),
                    at: view.at,
                    size: self.cell_size,
                    rotated: true,
                });
            }
        }
        for tray in &self.trays {
            for slot in &tray.slots {
                if slot.hovered {
                    commands.push(DrawCommand {
                        surface: Surface::Tray(tray.side),
                        sprite: Sprite::PieceBackground,
                        at: slot.at,
                        size: self.icon_size,
                        rotated: false,
                    });
                }
                commands.push(DrawCommand {
                    surface: Surface::Tray(tray.side),
                    sprite: Sprite::Piece(slot.sprite),
                    at: slot.at,
                    size: self.icon_size,
                    rotated: false,
                });
            }
        }
        commands
    }
}
