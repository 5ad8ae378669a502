use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    hit_test_piece_tray, layout_piece_tray, render, BoardLayout, Effects, FormatError,
    GameSummary, History, InboundEvent, Interaction, LoadSummary, MoveIntent, Scene,
    ScreenPoint, Side, Snapshot, Surface, TrayGeometry, TrayLayout, TraySlot,
};

/// State of the link to the authority, as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Offline,
    Live,
    /// Stays until the user retries. There are no automatic reconnects.
    Failed(String),
}

/// Everything the core asks the outside world to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    /// Send this to the authority.
    MoveIntent(MoveIntent),
    /// The authority refused the last move. Show a short-lived error.
    Rejected,
    GameOver(GameSummary),
    Status(ConnectionStatus),
    /// The scene changed. Always the last element when present.
    Redraw,
}

/// The viewer core: the game history, the local player's selection, and
/// the layouts used to draw both and to hit-test pointer input.
///
/// All state changes go through the methods below, each of which runs to
/// completion and reports its effects as [`Outbound`] events.
#[derive(Debug)]
pub struct Session {
    history: History,
    interaction: Interaction,
    board_layout: BoardLayout,
    tray_geometry: TrayGeometry,
    status: ConnectionStatus,
    /// Shown while the history is empty.
    initial: Snapshot,
    /// The tray layouts of the displayed snapshot, indexed by `Side as usize`.
    trays: [TrayLayout; 2],
}

/// Collects the events of one call, with at most one trailing redraw.
#[derive(Default)]
struct Outbox {
    events: Vec<Outbound>,
    redraw: bool,
}

impl Outbox {
    fn push(&mut self, event: Outbound) {
        self.events.push(event);
    }

    fn apply(&mut self, effects: Effects) {
        if let Some(intent) = effects.move_intent {
            self.events.push(Outbound::MoveIntent(intent));
        }
        self.redraw |= effects.redraw;
    }

    fn redraw(&mut self) {
        self.redraw = true;
    }

    fn finish(mut self) -> Vec<Outbound> {
        if self.redraw {
            self.events.push(Outbound::Redraw);
        }
        self.events
    }
}

impl Session {
    pub fn new(local_player: &str, board_layout: BoardLayout, tray_geometry: TrayGeometry) -> Self {
        let initial = Snapshot::initial();
        let trays = Side::ALL.map(|side| layout_piece_tray(initial.player(side), &tray_geometry));
        Self {
            history: History::new(),
            interaction: Interaction::new(local_player),
            board_layout,
            tray_geometry,
            status: ConnectionStatus::Offline,
            initial,
            trays,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn board_layout(&self) -> &BoardLayout {
        &self.board_layout
    }

    pub fn tray_geometry(&self) -> &TrayGeometry {
        &self.tray_geometry
    }

    /// Recorded games can only be opened while no live game is shown.
    pub fn can_load_file(&self) -> bool {
        self.status != ConnectionStatus::Live
    }

    /// The snapshot at the cursor, or the empty board.
    pub fn displayed(&self) -> &Snapshot {
        self.history.current().unwrap_or(&self.initial)
    }

    /// Computes the scene for the displayed snapshot.
    pub fn scene(&mut self) -> Scene {
        let scene = render(
            self.displayed(),
            &self.interaction,
            &self.board_layout,
            &self.tray_geometry,
        );
        self.trays = scene.trays.clone().map(|tray| tray.layout);
        scene
    }

    pub fn handle(&mut self, event: InboundEvent) -> Vec<Outbound> {
        let mut out = Outbox::default();
        match event {
            InboundEvent::Connected => {
                info!("Connected to the game server");
                self.history.stop_autoplay();
                out.apply(self.interaction.reset());
                self.set_status(ConnectionStatus::Live, &mut out);
            }
            InboundEvent::StateAppended(record) => {
                if self.history.append(record).is_ok() {
                    // A new state means the last move, if any, was accepted.
                    out.apply(self.interaction.reset());
                    self.display_changed(&mut out);
                }
            }
            InboundEvent::ActionRejected => {
                info!("The server rejected the move");
                out.apply(self.interaction.reset());
                out.push(Outbound::Rejected);
            }
            InboundEvent::Disconnected => {
                info!("Disconnected from the game server");
                self.history.stop_autoplay();
                self.set_status(ConnectionStatus::Offline, &mut out);
            }
            InboundEvent::GameOver(scores) => {
                match GameSummary::from_json(scores, self.history.last()) {
                    Ok(summary) => {
                        info!("Game over: {}", summary);
                        out.push(Outbound::GameOver(summary));
                    }
                    Err(err) => warn!("Ignoring malformed final scores: {}", err),
                }
            }
            InboundEvent::TransportFailed(reason) => {
                warn!("Connection failed: {}", reason);
                self.history.stop_autoplay();
                out.apply(self.interaction.reset());
                self.set_status(ConnectionStatus::Failed(reason), &mut out);
            }
        }
        out.finish()
    }

    /// Replaces the history with a recorded game.
    pub fn load_history(
        &mut self,
        file: Value,
    ) -> Result<(LoadSummary, Vec<Outbound>), FormatError> {
        let summary = self.history.load(file)?;
        let mut out = Outbox::default();
        out.apply(self.interaction.reset());
        self.display_changed(&mut out);
        Ok((summary, out.finish()))
    }

    pub fn clicked(&mut self, surface: Surface, point: ScreenPoint) -> Vec<Outbound> {
        let mut out = Outbox::default();
        let snapshot = self.history.current().unwrap_or(&self.initial);
        match surface {
            Surface::Board => {
                let cell = self.board_layout.hit_test_cell(point);
                out.apply(self.interaction.click_cell(snapshot, cell));
            }
            Surface::Tray(side) => {
                if let Some(kind) = hit_test_piece_tray(point, &self.trays[side as usize]) {
                    out.apply(self.interaction.click_piece(snapshot, TraySlot { side, kind }));
                }
            }
        }
        out.finish()
    }

    pub fn pointer_moved(&mut self, surface: Surface, point: ScreenPoint) -> Vec<Outbound> {
        let mut out = Outbox::default();
        let snapshot = self.history.current().unwrap_or(&self.initial);
        match surface {
            Surface::Board => {
                let cell = self.board_layout.hit_test_cell(point);
                out.apply(self.interaction.hover_cell(cell));
            }
            Surface::Tray(side) => {
                let slot = hit_test_piece_tray(point, &self.trays[side as usize])
                    .map(|kind| TraySlot { side, kind });
                out.apply(self.interaction.hover_piece(snapshot, slot));
            }
        }
        out.finish()
    }

    /// The pointer is no longer over `surface`.
    pub fn pointer_left(&mut self, surface: Surface) -> Vec<Outbound> {
        let mut out = Outbox::default();
        let snapshot = self.history.current().unwrap_or(&self.initial);
        match surface {
            Surface::Board => out.apply(self.interaction.hover_cell(None)),
            Surface::Tray(side) => {
                if self.interaction.hovered_piece().map(|slot| slot.side) == Some(side) {
                    out.apply(self.interaction.hover_piece(snapshot, None));
                }
            }
        }
        out.finish()
    }

    pub fn seek(&mut self, delta: isize) -> Vec<Outbound> {
        let moved = self.history.seek(delta);
        self.after_seek(moved)
    }

    pub fn seek_to(&mut self, index: usize) -> Vec<Outbound> {
        let moved = self.history.seek_to(index);
        self.after_seek(moved)
    }

    pub fn reset(&mut self) -> Vec<Outbound> {
        let moved = self.history.reset();
        self.after_seek(moved)
    }

    pub fn start_autoplay(&mut self, interval: Duration, now: Instant) -> bool {
        self.history.start_autoplay(interval, now)
    }

    pub fn set_autoplay_interval(&mut self, interval: Duration, now: Instant) {
        self.history.set_autoplay_interval(interval, now)
    }

    pub fn stop_autoplay(&mut self) {
        self.history.stop_autoplay()
    }

    /// Advances autoplay. Call this regularly from the event loop.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let steps = self.history.poll_autoplay(now);
        self.after_seek(steps > 0)
    }

    fn after_seek(&mut self, moved: bool) -> Vec<Outbound> {
        let mut out = Outbox::default();
        if moved {
            self.display_changed(&mut out);
        }
        out.finish()
    }

    fn display_changed(&mut self, out: &mut Outbox) {
        let snapshot = self.history.current().unwrap_or(&self.initial);
        out.apply(self.interaction.observe(snapshot));
        self.trays = Side::ALL.map(|side| layout_piece_tray(snapshot.player(side), &self.tray_geometry));
        out.redraw();
    }

    fn set_status(&mut self, status: ConnectionStatus, out: &mut Outbox) {
        if self.status != status {
            self.status = status.clone();
            out.push(Outbound::Status(status));
            out.redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::snapshot::tests::record;
    use crate::{kind, GridCell, Selection};

    fn session() -> Session {
        let board = BoardLayout::for_canvas(800.0, 800.0).unwrap();
        let tray = TrayGeometry::new(300.0, 800.0, board.cell_size());
        Session::new("alice", board, tray)
    }

    fn click_white_tray(session: &mut Session, code: &str) -> Vec<Outbound> {
        let kind = code.parse().unwrap();
        let at = session.scene().tray(Side::White).layout.get(kind).unwrap();
        session.clicked(Surface::Tray(Side::White), at)
    }

    #[test]
    fn live_move_round_trip() {
        let mut session = session();
        assert_eq!(
            session.handle(InboundEvent::Connected),
            vec![Outbound::Status(ConnectionStatus::Live), Outbound::Redraw]
        );
        assert!(!session.can_load_file());

        let out = session.handle(InboundEvent::StateAppended(record("alice", json!({}))));
        assert_eq!(out, vec![Outbound::Redraw]);
        assert_eq!(session.history().cursor(), Some(0));

        assert_eq!(click_white_tray(&mut session, "RR"), vec![Outbound::Redraw]);
        let cell = GridCell { row: 4, col: 4 };
        let at = session.board_layout().cell_center(cell);
        let out = session.clicked(Surface::Board, at);
        assert_eq!(
            out,
            vec![
                Outbound::MoveIntent(MoveIntent {
                    piece: kind!("RR"),
                    cell
                }),
                Outbound::Redraw
            ]
        );
        // Idle again, so clicking once more sends nothing.
        assert!(session.clicked(Surface::Board, at).is_empty());
    }

    #[test]
    fn board_clicks_without_selection_do_nothing() {
        let mut session = session();
        session.handle(InboundEvent::StateAppended(record("alice", json!({}))));
        let at = session.board_layout().cell_center(GridCell { row: 4, col: 4 });
        assert!(session.clicked(Surface::Board, at).is_empty());
    }

    #[test]
    fn rejection_clears_the_selection() {
        let mut session = session();
        session.handle(InboundEvent::StateAppended(record("alice", json!({}))));
        click_white_tray(&mut session, "GC");
        assert_eq!(
            session.interaction().selection(),
            Selection::PieceSelected(kind!("GC"))
        );
        let out = session.handle(InboundEvent::ActionRejected);
        assert_eq!(out, vec![Outbound::Rejected, Outbound::Redraw]);
        assert_eq!(session.interaction().selection(), Selection::Idle);
    }

    #[test]
    fn turn_change_clears_the_selection() {
        let mut session = session();
        session.handle(InboundEvent::StateAppended(record("alice", json!({}))));
        click_white_tray(&mut session, "GC");
        let out = session.handle(InboundEvent::StateAppended(record("bob", json!({}))));
        assert!(!out.iter().any(|e| matches!(e, Outbound::MoveIntent(_))));
        assert_eq!(session.interaction().selection(), Selection::Idle);
        // Not our turn anymore.
        assert!(click_white_tray(&mut session, "GC").is_empty());
    }

    #[test]
    fn malformed_updates_change_nothing() {
        let mut session = session();
        session.handle(InboundEvent::StateAppended(record("alice", json!({}))));
        let out = session.handle(InboundEvent::StateAppended(json!({"rep": 1})));
        assert!(out.is_empty());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn game_over_and_disconnect() {
        let mut session = session();
        session.handle(InboundEvent::Connected);
        session.handle(InboundEvent::StateAppended(record("alice", json!({}))));
        let out = session.handle(InboundEvent::GameOver(json!({"7": 12, "8": 7})));
        let [Outbound::GameOver(summary)] = out.as_slice() else {
            panic!("unexpected events {:?}", out);
        };
        assert_eq!(summary.to_string(), "alice (W) wins with 12 points against 7");

        assert!(session.handle(InboundEvent::GameOver(json!("garbage"))).is_empty());

        let out = session.handle(InboundEvent::Disconnected);
        assert_eq!(
            out,
            vec![Outbound::Status(ConnectionStatus::Offline), Outbound::Redraw]
        );
        assert!(session.can_load_file());
    }

    #[test]
    fn transport_failures_persist() {
        let mut session = session();
        let out = session.handle(InboundEvent::TransportFailed(String::from("refused")));
        assert_eq!(
            out,
            vec![
                Outbound::Status(ConnectionStatus::Failed(String::from("refused"))),
                Outbound::Redraw
            ]
        );
        assert_eq!(
            session.status(),
            &ConnectionStatus::Failed(String::from("refused"))
        );
    }

    #[test]
    fn replay_and_autoplay() {
        let mut session = session();
        let file = json!([
            record("alice", json!({})),
            record("bob", json!({})),
            record("alice", json!({ "(4, 4)": { "piece_type": "RR", "owner_id": 7 } })),
        ]);
        let (summary, out) = session.load_history(file).unwrap();
        assert_eq!(summary.loaded, 3);
        assert_eq!(out, vec![Outbound::Redraw]);
        assert_eq!(session.displayed().next_player_name(), "alice");

        assert_eq!(session.seek(1), vec![Outbound::Redraw]);
        assert!(session.seek(5).contains(&Outbound::Redraw));
        assert!(session.seek(5).is_empty());
        assert_eq!(session.displayed().occupancy().len(), 1);
        assert_eq!(session.reset(), vec![Outbound::Redraw]);

        let start = Instant::now();
        let interval = Duration::from_millis(200);
        assert!(session.start_autoplay(interval, start));
        assert!(session.tick(start).is_empty());
        assert_eq!(session.tick(start + interval), vec![Outbound::Redraw]);
        assert_eq!(session.tick(start + interval * 2), vec![Outbound::Redraw]);
        assert!(!session.history().is_playing());
        assert!(session.tick(start + interval * 3).is_empty());
    }

    #[test]
    fn disconnects_and_failures_stop_autoplay() {
        let mut session = session();
        let file = json!([
            record("alice", json!({})),
            record("bob", json!({})),
            record("alice", json!({})),
        ]);
        session.load_history(file).unwrap();
        let start = Instant::now();
        let interval = Duration::from_millis(100);

        assert!(session.start_autoplay(interval, start));
        session.handle(InboundEvent::Disconnected);
        assert!(!session.history().is_playing());
        assert!(session.tick(start + interval * 5).is_empty());
        assert_eq!(session.history().cursor(), Some(0));

        assert!(session.start_autoplay(interval, start));
        let out = session.handle(InboundEvent::TransportFailed(String::from("reset by peer")));
        assert!(!session.history().is_playing());
        assert!(out.contains(&Outbound::Status(ConnectionStatus::Failed(String::from(
            "reset by peer"
        )))));
        assert!(session.tick(start + interval * 5).is_empty());
        assert_eq!(session.history().cursor(), Some(0));
    }

    #[test]
    fn connecting_stops_autoplay_and_clears_selection() {
        let mut session = session();
        session
            .load_history(json!([record("alice", json!({})), record("alice", json!({}))]))
            .unwrap();
        click_white_tray(&mut session, "RR");
        session.start_autoplay(Duration::from_millis(100), Instant::now());
        session.handle(InboundEvent::Connected);
        assert!(!session.history().is_playing());
        assert_eq!(session.interaction().selection(), Selection::Idle);
    }

    #[test]
    fn hovering() {
        let mut session = session();
        let at = session.board_layout().cell_center(GridCell { row: 2, col: 3 });
        assert_eq!(session.pointer_moved(Surface::Board, at), vec![Outbound::Redraw]);
        assert!(session.pointer_moved(Surface::Board, at).is_empty());
        assert_eq!(
            session.interaction().hovered_cell(),
            Some(GridCell { row: 2, col: 3 })
        );
        assert_eq!(session.pointer_left(Surface::Board), vec![Outbound::Redraw]);
        assert!(session.scene().cells.iter().all(|c| !c.highlighted));
    }
}
