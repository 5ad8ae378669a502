use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use divercite::{
    AssetRegistry, CellKind, ConnectionStatus, DrawCommand, GridCell, InboundEvent, LoadSummary,
    Outbound, Piece, PieceColor, Scene, ScreenPoint, Session, Side, Sprite, Surface, TrayView,
};
use ratatui::{
    crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind},
    prelude::*,
    widgets::{
        canvas::{Canvas, Circle, Context, Line as Segment, Rectangle},
        *,
    },
};
use tracing::{debug, info, warn};

use crate::config::{CanvasSize, ViewerConfig};
use crate::transport::{Connection, CONNECT_TIMEOUT};

const POLL_INTERVAL: Duration = Duration::from_millis(16);
/// How long a notice stays in the status bar.
const FLASH_DURATION: Duration = Duration::from_secs(2);
const MIN_INTERVAL: Duration = Duration::from_millis(50);
const MAX_INTERVAL: Duration = Duration::from_secs(5);

const HELP: &str = "n/p step  r reset  space autoplay  +/- speed  o open  c connect  q quit";

/// A short message in the status bar.
struct Flash {
    text: String,
    since: Instant,
    error: bool,
}

/// Where the surfaces were drawn last, in terminal cells.
#[derive(Default)]
struct Areas {
    board: Rect,
    /// Indexed by `Side as usize`.
    trays: [Rect; 2],
}

pub struct App {
    session: Session,
    config: ViewerConfig,
    interval: Duration,
    connection: Option<Connection>,
    /// Events of the current connection. Replaced on every connect.
    inbound: Option<Receiver<InboundEvent>>,
    assets: AssetRegistry<Sprite, DrawCommand>,
    areas: Areas,
    hovered_surface: Option<Surface>,
    flash: Option<Flash>,
    game_over: Option<String>,
    needs_redraw: bool,
    should_quit: bool,
}

impl App {
    pub fn new(session: Session, config: ViewerConfig) -> Self {
        let mut assets = AssetRegistry::new();
        for sprite in Sprite::all() {
            assets.register(sprite);
        }
        Self {
            session,
            interval: config.interval(),
            config,
            connection: None,
            inbound: None,
            assets,
            areas: Areas::default(),
            hovered_surface: None,
            flash: None,
            game_over: None,
            needs_redraw: true,
            should_quit: false,
        }
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        self.load_sprites();
        while !self.should_quit {
            self.drain_inbound();
            let out = self.session.tick(Instant::now());
            self.dispatch(out);
            if self
                .flash
                .as_ref()
                .is_some_and(|flash| flash.since.elapsed() >= FLASH_DURATION)
            {
                self.flash = None;
                self.needs_redraw = true;
            }
            if self.needs_redraw {
                self.needs_redraw = false;
                terminal.draw(|frame| self.ui(frame))?;
            }
            if event::poll(POLL_INTERVAL)? {
                self.handle_terminal_event(event::read()?);
            }
        }
        Ok(())
    }

    /// Terminal "sprites" are styles, so they are all ready before the
    /// first frame. Draws that were held back for them are covered by the
    /// next full redraw.
    fn load_sprites(&mut self) {
        for sprite in Sprite::all() {
            let released = self.assets.mark_ready(sprite);
            if !released.is_empty() {
                debug!(%sprite, draws = released.len(), "Sprite ready, redrawing");
                self.needs_redraw = true;
            }
        }
    }

    fn notify(&mut self, text: impl Into<String>, error: bool) {
        self.flash = Some(Flash {
            text: text.into(),
            since: Instant::now(),
            error,
        });
        self.needs_redraw = true;
    }

    /// Opens a new connection, dropping the old one.
    pub fn connect(&mut self) {
        self.disconnect();
        let address = self.config.address();
        info!(%address, "Connecting");
        let (tx, rx) = mpsc::channel();
        self.connection = Connection::open(&address, CONNECT_TIMEOUT, tx);
        self.inbound = Some(rx);
        self.game_over = None;
        self.needs_redraw = true;
    }

    /// Replaces the history with the configured recorded game.
    fn open_record(&mut self) {
        if !self.session.can_load_file() {
            self.notify("Disconnect before opening a recorded game", true);
            return;
        }
        let Some(path) = self.config.record.clone() else {
            self.notify("No recorded game, pass one with --record", true);
            return;
        };
        // A connection that is still being set up would append to the replay.
        self.disconnect();
        match load_record(&mut self.session, &path) {
            Ok((summary, out)) => {
                self.game_over = None;
                self.notify(summary.to_string(), !summary.dropped.is_empty());
                self.dispatch(out);
            }
            Err(err) => {
                warn!("{:#}", err);
                self.notify(format!("{:#}", err), true);
            }
        }
    }

    fn disconnect(&mut self) {
        self.connection = None;
        // Stale events of a closed connection must not reach the session.
        self.inbound = None;
    }

    fn drain_inbound(&mut self) {
        while let Some(event) = self.inbound.as_ref().and_then(|rx| rx.try_recv().ok()) {
            let out = self.session.handle(event);
            self.dispatch(out);
        }
    }

    fn dispatch(&mut self, out: Vec<Outbound>) {
        for event in out {
            match event {
                Outbound::MoveIntent(intent) => {
                    let Some(connection) = self.connection.as_mut() else {
                        debug!(?intent, "Not connected, dropping move");
                        continue;
                    };
                    if let Err(err) = connection.send(intent) {
                        warn!("Could not send move: {}", err);
                        let out = self
                            .session
                            .handle(InboundEvent::TransportFailed(err.to_string()));
                        self.dispatch(out);
                    }
                }
                Outbound::Rejected => self.notify("Move not permitted", true),
                Outbound::GameOver(summary) => {
                    self.game_over = Some(summary.to_string());
                    self.needs_redraw = true;
                }
                Outbound::Status(status) => {
                    if status != ConnectionStatus::Live {
                        self.disconnect();
                    }
                    self.needs_redraw = true;
                }
                Outbound::Redraw => self.needs_redraw = true,
            }
        }
    }

    fn handle_terminal_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key.code),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(_, _) => self.needs_redraw = true,
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        let now = Instant::now();
        let out = match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Char('n') | KeyCode::Right => self.session.seek(1),
            KeyCode::Char('p') | KeyCode::Left => self.session.seek(-1),
            KeyCode::Char('r') | KeyCode::Home => self.session.reset(),
            KeyCode::End => self.session.seek_to(usize::MAX),
            KeyCode::Char(' ') => {
                if self.session.history().is_playing() {
                    self.session.stop_autoplay();
                } else {
                    self.session.start_autoplay(self.interval, now);
                }
                self.needs_redraw = true;
                Vec::new()
            }
            KeyCode::Char('+') => {
                self.change_interval(self.interval / 2, now);
                Vec::new()
            }
            KeyCode::Char('-') => {
                self.change_interval(self.interval * 2, now);
                Vec::new()
            }
            KeyCode::Char('o') => {
                self.open_record();
                Vec::new()
            }
            KeyCode::Char('c') => {
                self.connect();
                Vec::new()
            }
            _ => Vec::new(),
        };
        self.dispatch(out);
    }

    fn change_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        self.session.set_autoplay_interval(self.interval, now);
        self.needs_redraw = true;
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let target = self.surface_at(mouse.column, mouse.row);
        let out = match mouse.kind {
            MouseEventKind::Moved => {
                let mut out = Vec::new();
                let surface = target.map(|(surface, _)| surface);
                if let Some(left) = self.hovered_surface.filter(|&s| Some(s) != surface) {
                    out.extend(self.session.pointer_left(left));
                }
                self.hovered_surface = surface;
                if let Some((surface, point)) = target {
                    out.extend(self.session.pointer_moved(surface, point));
                }
                out
            }
            MouseEventKind::Down(MouseButton::Left) => match target {
                Some((surface, point)) => self.session.clicked(surface, point),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        self.dispatch(out);
    }

    fn surface_at(&self, column: u16, row: u16) -> Option<(Surface, ScreenPoint)> {
        if let Some(point) = to_screen_point(self.areas.board, self.config.board_canvas, column, row)
        {
            return Some((Surface::Board, point));
        }
        Side::ALL.into_iter().find_map(|side| {
            to_screen_point(
                self.areas.trays[side as usize],
                self.config.tray_panel,
                column,
                row,
            )
            .map(|point| (Surface::Tray(side), point))
        })
    }

    fn ui(&mut self, frame: &mut Frame) {
        let [main, status] = Layout::new(
            Direction::Vertical,
            [Constraint::Min(0), Constraint::Length(4)],
        )
        .areas(frame.size());
        let [white, board, black] = Layout::new(
            Direction::Horizontal,
            [
                Constraint::Percentage(25),
                Constraint::Percentage(50),
                Constraint::Percentage(25),
            ],
        )
        .areas(main);

        let scene = self.session.scene();
        // Every frame is drawn in full, so draws held back for the last one are stale.
        self.assets.discard_deferred();
        let commands: Vec<DrawCommand> = scene
            .draw_commands()
            .into_iter()
            .filter_map(|command| self.assets.submit(command.sprite, command))
            .collect();

        let board_block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(" Divercite ");
        self.areas.board = board_block.inner(board);
        frame.render_widget(board_canvas(&scene, &commands, self.config.board_canvas, board_block), board);

        for (side, area) in [(Side::White, white), (Side::Black, black)] {
            let tray = scene.tray(side);
            let mut block = Block::bordered()
                .border_type(BorderType::Rounded)
                .title(format!(" {} ({}) ", tray.name, side));
            if tray.has_turn {
                block = block.border_style(Style::new().fg(Color::Yellow));
            }
            self.areas.trays[side as usize] = block.inner(area);
            frame.render_widget(tray_canvas(tray, &commands, self.config.tray_panel, block), area);
        }

        frame.render_widget(self.status_bar(), status);
    }

    fn status_bar(&self) -> Paragraph<'static> {
        let history = self.session.history();
        let connection = match self.session.status() {
            ConnectionStatus::Offline => Span::raw("offline"),
            ConnectionStatus::Live => Span::styled("live", Style::new().fg(Color::Green)),
            ConnectionStatus::Failed(reason) => {
                Span::styled(format!("failed: {}", reason), Style::new().fg(Color::Red))
            }
        };
        let step = format!(
            " | step {}/{}",
            history.cursor().map_or(0, |idx| idx + 1),
            history.len()
        );
        let autoplay = if history.is_playing() {
            format!(" | playing every {} ms", self.interval.as_millis())
        } else {
            format!(" | paused ({} ms)", self.interval.as_millis())
        };
        let mut first = vec![connection, Span::raw(step), Span::raw(autoplay)];
        if let Some(flash) = &self.flash {
            let style = if flash.error {
                Style::new().fg(Color::Red).add_modifier(Modifier::BOLD)
            } else {
                Style::new().add_modifier(Modifier::BOLD)
            };
            first.push(Span::styled(format!(" | {}", flash.text), style));
        }
        let mut lines = vec![Line::from(first)];
        if let Some(result) = &self.game_over {
            lines.push(Line::styled(
                result.clone(),
                Style::new().add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::styled(HELP, Style::new().fg(Color::DarkGray)));
        Paragraph::new(lines).block(Block::new().borders(Borders::TOP))
    }
}

/// Reads a recorded game into `session`.
pub fn load_record(
    session: &mut Session,
    path: &Path,
) -> anyhow::Result<(LoadSummary, Vec<Outbound>)> {
    let file = File::open(path).map_err(|err| {
        anyhow::anyhow!("Could not open recorded game '{}': {}", path.display(), err)
    })?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
    let (summary, out) = session.load_history(json)?;
    if summary.dropped.is_empty() {
        info!(path = %path.display(), loaded = summary.loaded, "Loaded recorded game");
    } else {
        warn!(
            path = %path.display(),
            loaded = summary.loaded,
            dropped = summary.dropped.len(),
            "Loaded recorded game with malformed states"
        );
    }
    Ok((summary, out))
}

/// Maps a terminal cell inside `area` to the center of the matching
/// region of a canvas of `size`.
fn to_screen_point(area: Rect, size: CanvasSize, column: u16, row: u16) -> Option<ScreenPoint> {
    if area.width == 0
        || area.height == 0
        || column < area.x
        || row < area.y
        || column >= area.x + area.width
        || row >= area.y + area.height
    {
        return None;
    }
    let x = (column - area.x) as f64 + 0.5;
    let y = (row - area.y) as f64 + 0.5;
    Some(ScreenPoint::new(
        x * size.width / area.width as f64,
        y * size.height / area.height as f64,
    ))
}

fn piece_color(color: PieceColor) -> Color {
    match color {
        PieceColor::Red => Color::Red,
        PieceColor::Green => Color::Green,
        PieceColor::Blue => Color::Blue,
        PieceColor::Yellow => Color::Yellow,
    }
}

/// Canvas coordinates grow upwards.
fn flip(size: CanvasSize, at: ScreenPoint) -> (f64, f64) {
    (at.x, size.height - at.y)
}

fn draw_sprite(ctx: &mut Context, size: CanvasSize, command: &DrawCommand) {
    let (x, y) = flip(size, command.at);
    let radius = command.size / 2.0;
    match command.sprite {
        Sprite::Board => {}
        Sprite::PieceBackground => ctx.draw(&Circle {
            x,
            y,
            radius: radius * 0.9,
            color: Color::DarkGray,
        }),
        Sprite::Piece(piece) => draw_piece(ctx, x, y, radius, piece),
    }
}

fn draw_piece(ctx: &mut Context, x: f64, y: f64, radius: f64, piece: Piece) {
    let color = piece_color(piece.color());
    match piece {
        Piece::Ring(_) => {
            ctx.draw(&Circle {
                x,
                y,
                radius: radius * 0.7,
                color,
            });
            ctx.draw(&Circle {
                x,
                y,
                radius: radius * 0.4,
                color,
            });
        }
        Piece::Connector(_, side) => {
            let half = radius * 0.6;
            ctx.draw(&Rectangle {
                x: x - half,
                y: y - half,
                width: 2.0 * half,
                height: 2.0 * half,
                color: match side {
                    Side::White => Color::White,
                    Side::Black => Color::DarkGray,
                },
            });
            ctx.draw(&Circle {
                x,
                y,
                radius: radius * 0.3,
                color,
            });
        }
    }
}

fn board_canvas<'a>(
    scene: &'a Scene,
    commands: &'a [DrawCommand],
    size: CanvasSize,
    block: Block<'a>,
) -> impl Widget + 'a {
    Canvas::default()
        .block(block)
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, size.width])
        .y_bounds([0.0, size.height])
        .paint(move |ctx| {
            if commands.iter().any(|c| c.sprite == Sprite::Board) {
                draw_board_outline(ctx, scene, size);
            }
            ctx.layer();
            for command in commands.iter().filter(|c| c.surface == Surface::Board) {
                draw_sprite(ctx, size, command);
            }
            for view in &scene.cells {
                let (x, y) = flip(size, view.at);
                if view.highlighted {
                    ctx.draw(&Circle {
                        x,
                        y,
                        radius: scene.cell_size / 2.0,
                        color: Color::Yellow,
                    });
                }
                match (view.piece, view.kind) {
                    (Some(piece), _) => ctx.print(x, y, piece.to_string()),
                    (None, CellKind::RingSlot) => ctx.print(x, y, "o"),
                    (None, _) => ctx.print(x, y, "·"),
                }
            }
        })
}

/// Lines through the outermost cells, which form an upright square on screen.
fn draw_board_outline(ctx: &mut Context, scene: &Scene, size: CanvasSize) {
    let corner = |row, col| {
        scene
            .cells
            .iter()
            .find(|view| view.cell == GridCell { row, col })
            .map(|view| flip(size, view.at))
    };
    let corners = [corner(0, 4), corner(4, 8), corner(8, 4), corner(4, 0)];
    for i in 0..corners.len() {
        if let (Some((x1, y1)), Some((x2, y2))) = (corners[i], corners[(i + 1) % corners.len()]) {
            ctx.draw(&Segment {
                x1,
                y1,
                x2,
                y2,
                color: Color::Gray,
            });
        }
    }
}

fn tray_canvas<'a>(
    tray: &'a TrayView,
    commands: &'a [DrawCommand],
    size: CanvasSize,
    block: Block<'a>,
) -> impl Widget + 'a {
    Canvas::default()
        .block(block)
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, size.width])
        .y_bounds([0.0, size.height])
        .paint(move |ctx| {
            let surface = Surface::Tray(tray.side);
            for command in commands.iter().filter(|c| c.surface == surface) {
                draw_sprite(ctx, size, command);
            }
            let radius = tray.layout.radius();
            for slot in &tray.slots {
                let (x, y) = flip(size, slot.at);
                if slot.selected {
                    ctx.draw(&Circle {
                        x,
                        y,
                        radius,
                        color: Color::Yellow,
                    });
                }
                ctx.print(x + radius * 1.2, y, format!("x{}", slot.count));
            }
            ctx.print(
                size.width / 10.0,
                size.height * 0.9,
                Line::styled(
                    format!("Score: {}", tray.score),
                    Style::new().add_modifier(Modifier::BOLD),
                ),
            );
            if tray.has_turn {
                ctx.print(
                    size.width / 10.0,
                    size.height * 0.85,
                    Line::styled("To move", Style::new().fg(Color::Yellow)),
                );
            }
        })
}
