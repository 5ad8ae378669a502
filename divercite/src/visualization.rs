use crate::{CellKind, GridCell, Side, Snapshot, GRID_SIZE};

/// Width of one cell in the text rendering.
const CELL_WIDTH: usize = 3;
const HALF: usize = GRID_SIZE / 2;

/// Draws the board as text, turned by 45° like on screen, followed by the
/// players and whose turn it is.
///
/// Empty ring slots are shown as `o`, empty connector slots as `·`.
pub fn visualize_board(snapshot: &Snapshot) -> String {
    // The diamond of playable cells becomes a square: cell (r, c) lands on
    // line r + c - HALF, column c - r + HALF.
    let mut lines = vec![vec![String::from("   "); GRID_SIZE]; GRID_SIZE];
    for cell in GridCell::playable() {
        let (row, col) = (cell.row as usize, cell.col as usize);
        let text = match (snapshot.occupancy().get(&cell), cell.kind()) {
            (Some(occupant), _) => occupant.piece.to_string(),
            (None, CellKind::RingSlot) => String::from("o"),
            (None, _) => String::from("·"),
        };
        lines[row + col - HALF][col + HALF - row] = format!("{:^3}", text);
    }

    let border = "─".repeat(GRID_SIZE * CELL_WIDTH);
    let mut result = format!("╭{}╮\n", border);
    for line in lines {
        result += &format!("│{}│\n", line.concat());
    }
    result += &format!("╰{}╯", border);
    for side in Side::ALL {
        let player = snapshot.player(side);
        let marker = if snapshot.is_turn_of(&player.name) {
            " <"
        } else {
            ""
        };
        result += &format!(
            "\n{} {} (id {}): {} points{}",
            side, player.name, player.id, player.score, marker
        );
    }
    result
}
