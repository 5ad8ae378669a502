use tracing::{debug, trace};

use crate::{GridCell, MoveIntent, PieceKind, Side, Snapshot};

/// Whether the local player has picked a piece from their tray.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Idle,
    PieceSelected(PieceKind),
}

/// An icon in one of the two trays.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraySlot {
    pub side: Side,
    pub kind: PieceKind,
}

/// What an interaction step asks of the outside world.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Effects {
    /// Set at most once per completed selection.
    pub move_intent: Option<MoveIntent>,
    /// Highlights changed and the scene should be drawn again.
    pub redraw: bool,
}

impl Effects {
    fn redraw() -> Self {
        Self {
            move_intent: None,
            redraw: true,
        }
    }

    fn none() -> Self {
        Self::default()
    }
}

/// Turns clicks on trays and cells into at most one [`MoveIntent`] per selection.
///
/// Moves are not checked against the game rules. Clicks that cannot lead to
/// a move in the current state are ignored.
#[derive(Clone, Debug)]
pub struct Interaction {
    local_player: String,
    selection: Selection,
    hovered_cell: Option<GridCell>,
    hovered_piece: Option<TraySlot>,
    /// Whose turn it was in the last snapshot seen by [`Self::observe()`].
    turn: String,
}

impl Interaction {
    /// `local_player` is the display name the authority uses for this viewer's player.
    pub fn new(local_player: &str) -> Self {
        Self {
            local_player: String::from(local_player),
            selection: Selection::Idle,
            hovered_cell: None,
            hovered_piece: None,
            turn: String::new(),
        }
    }

    pub fn local_player(&self) -> &str {
        &self.local_player
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_piece(&self) -> Option<PieceKind> {
        match self.selection {
            Selection::Idle => None,
            Selection::PieceSelected(kind) => Some(kind),
        }
    }

    pub fn hovered_cell(&self) -> Option<GridCell> {
        self.hovered_cell
    }

    pub fn hovered_piece(&self) -> Option<TraySlot> {
        self.hovered_piece
    }

    /// The local player's side, if it is their turn in `snapshot`.
    pub fn local_turn(&self, snapshot: &Snapshot) -> Option<Side> {
        if !snapshot.is_turn_of(&self.local_player) {
            return None;
        }
        snapshot
            .players()
            .find(|(_, player)| player.name == self.local_player)
            .map(|(side, _)| side)
    }

    /// Call whenever a different snapshot is displayed. Clears the selection
    /// if the turn changed.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Effects {
        if snapshot.next_player_name() == self.turn {
            return Effects::none();
        }
        self.turn = String::from(snapshot.next_player_name());
        debug!(next_player = %self.turn, "Turn changed");
        self.reset()
    }

    /// Back to [`Selection::Idle`], e.g. after the authority accepted or rejected a move.
    pub fn reset(&mut self) -> Effects {
        let changed = self.selection != Selection::Idle || self.hovered_piece.is_some();
        self.selection = Selection::Idle;
        self.hovered_piece = None;
        if changed {
            Effects::redraw()
        } else {
            Effects::none()
        }
    }

    pub fn click_piece(&mut self, snapshot: &Snapshot, slot: TraySlot) -> Effects {
        if self.local_turn(snapshot) != Some(slot.side) {
            trace!(?slot, "Ignoring tray click outside of the local player's turn");
            return Effects::none();
        }
        if self.selection == Selection::PieceSelected(slot.kind) {
            debug!(piece = %slot.kind, "Piece deselected");
            self.selection = Selection::Idle;
            return Effects::redraw();
        }
        if snapshot.player(slot.side).remaining(slot.kind) == 0 {
            trace!(piece = %slot.kind, "Ignoring click on a used-up piece");
            return Effects::none();
        }
        debug!(piece = %slot.kind, "Piece selected");
        self.selection = Selection::PieceSelected(slot.kind);
        Effects::redraw()
    }

    /// `cell` is the result of hit-testing the click, `None` if no cell was hit.
    pub fn click_cell(&mut self, snapshot: &Snapshot, cell: Option<GridCell>) -> Effects {
        let Selection::PieceSelected(piece) = self.selection else {
            trace!(?cell, "Ignoring board click without a selected piece");
            return Effects::none();
        };
        if self.local_turn(snapshot).is_none() {
            trace!(?cell, "Ignoring board click outside of the local player's turn");
            return Effects::none();
        }
        let Some(cell) = cell.filter(|cell| cell.is_playable()) else {
            return Effects::none();
        };
        let intent = MoveIntent { piece, cell };
        debug!(?intent, "Proposing move");
        self.selection = Selection::Idle;
        self.hovered_cell = None;
        self.hovered_piece = None;
        Effects {
            move_intent: Some(intent),
            redraw: true,
        }
    }

    /// Only asks for a redraw when the hovered cell is a different one.
    pub fn hover_cell(&mut self, cell: Option<GridCell>) -> Effects {
        if self.hovered_cell == cell {
            return Effects::none();
        }
        self.hovered_cell = cell;
        Effects::redraw()
    }

    /// Tray icons only react to hovering on the tray of the player to move.
    pub fn hover_piece(&mut self, snapshot: &Snapshot, slot: Option<TraySlot>) -> Effects {
        let slot = slot.filter(|slot| self.local_turn(snapshot) == Some(slot.side));
        if self.hovered_piece == slot {
            return Effects::none();
        }
        self.hovered_piece = slot;
        Effects::redraw()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::kind;
    use crate::snapshot::tests::record;

    fn snapshot(next_player: &str) -> Snapshot {
        Snapshot::from_json(record(next_player, json!({}))).unwrap()
    }

    fn white(code: PieceKind) -> TraySlot {
        TraySlot {
            side: Side::White,
            kind: code,
        }
    }

    const CELL: GridCell = GridCell { row: 4, col: 4 };

    #[test]
    fn select_then_place_emits_one_intent() {
        let state = snapshot("alice");
        let mut ui = Interaction::new("alice");
        assert!(ui.observe(&state).move_intent.is_none());

        let effects = ui.click_piece(&state, white(kind!("RR")));
        assert!(effects.redraw);
        assert_eq!(ui.selection(), Selection::PieceSelected(kind!("RR")));

        let effects = ui.click_cell(&state, Some(CELL));
        assert_eq!(
            effects.move_intent,
            Some(MoveIntent {
                piece: kind!("RR"),
                cell: CELL
            })
        );
        assert_eq!(ui.selection(), Selection::Idle);

        // Nothing is selected anymore, so a second click does nothing.
        assert_eq!(ui.click_cell(&state, Some(CELL)), Effects::default());
    }

    #[test]
    fn clicking_the_selected_piece_again_deselects() {
        let state = snapshot("alice");
        let mut ui = Interaction::new("alice");
        let _ = ui.click_piece(&state, white(kind!("GC")));
        let effects = ui.click_piece(&state, white(kind!("GC")));
        assert!(effects.redraw);
        assert!(effects.move_intent.is_none());
        assert_eq!(ui.selection(), Selection::Idle);
    }

    #[test]
    fn selecting_another_piece_replaces_the_selection() {
        let state = snapshot("alice");
        let mut ui = Interaction::new("alice");
        let _ = ui.click_piece(&state, white(kind!("GC")));
        let _ = ui.click_piece(&state, white(kind!("YR")));
        assert_eq!(ui.selected_piece(), Some(kind!("YR")));
    }

    #[test]
    fn clicks_outside_of_the_local_turn_are_ignored() {
        let state = snapshot("bob");
        let mut ui = Interaction::new("alice");
        assert_eq!(ui.click_piece(&state, white(kind!("RR"))), Effects::default());
        assert_eq!(ui.selection(), Selection::Idle);

        // Even on our turn, the opponent's tray is off limits.
        let state = snapshot("alice");
        let black = TraySlot {
            side: Side::Black,
            kind: kind!("RR"),
        };
        assert_eq!(ui.click_piece(&state, black), Effects::default());
        assert_eq!(ui.click_cell(&state, Some(CELL)), Effects::default());
    }

    #[test]
    fn used_up_pieces_cannot_be_selected() {
        let mut raw = record("alice", json!({}));
        raw["players_pieces_left"]["7"]["BC"] = json!(0);
        let state = Snapshot::from_json(raw).unwrap();
        let mut ui = Interaction::new("alice");
        assert_eq!(ui.click_piece(&state, white(kind!("BC"))), Effects::default());
        assert_eq!(ui.selection(), Selection::Idle);
    }

    #[test]
    fn board_clicks_off_the_board_keep_the_selection() {
        let state = snapshot("alice");
        let mut ui = Interaction::new("alice");
        let _ = ui.click_piece(&state, white(kind!("RR")));
        assert_eq!(ui.click_cell(&state, None), Effects::default());
        let off_board = GridCell { row: 0, col: 0 };
        assert_eq!(ui.click_cell(&state, Some(off_board)), Effects::default());
        assert_eq!(ui.selected_piece(), Some(kind!("RR")));
    }

    #[test]
    fn turn_change_clears_the_selection() {
        let mut ui = Interaction::new("alice");
        let ours = snapshot("alice");
        let _ = ui.observe(&ours);
        let _ = ui.click_piece(&ours, white(kind!("RR")));

        let effects = ui.observe(&snapshot("bob"));
        assert!(effects.redraw);
        assert!(effects.move_intent.is_none());
        assert_eq!(ui.selection(), Selection::Idle);
    }

    #[test]
    fn same_turn_keeps_the_selection() {
        let mut ui = Interaction::new("alice");
        let ours = snapshot("alice");
        let _ = ui.observe(&ours);
        let _ = ui.click_piece(&ours, white(kind!("RR")));
        assert_eq!(ui.observe(&snapshot("alice")), Effects::default());
        assert_eq!(ui.selected_piece(), Some(kind!("RR")));
        assert!(ui.reset().redraw);
        assert_eq!(ui.reset(), Effects::default());
    }

    #[test]
    fn hover_redraws_only_on_change() {
        let state = snapshot("alice");
        let mut ui = Interaction::new("alice");
        assert!(ui.hover_cell(Some(CELL)).redraw);
        assert!(!ui.hover_cell(Some(CELL)).redraw);
        assert!(ui.hover_cell(None).redraw);
        assert!(!ui.hover_cell(None).redraw);

        assert!(ui.hover_piece(&state, Some(white(kind!("RC")))).redraw);
        assert!(!ui.hover_piece(&state, Some(white(kind!("RC")))).redraw);
        let theirs = TraySlot {
            side: Side::Black,
            kind: kind!("RC"),
        };
        assert!(ui.hover_piece(&state, Some(theirs)).redraw);
        assert_eq!(ui.hovered_piece(), None);
    }
}
