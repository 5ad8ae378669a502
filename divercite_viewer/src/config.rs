use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use divercite::{BoardLayout, TrayGeometry};
use serde::Deserialize;

/// The size of a drawing surface, in screen units.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

/// Settings read from the optional `--config` file. Every field has a
/// default, and command line arguments take precedence.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub host: String,
    pub port: u16,
    /// The display name of the local player. Without one, the viewer only watches.
    pub name: Option<String>,
    pub interval_ms: u64,
    /// A recorded game, replayed at startup and reopened with the load key.
    pub record: Option<PathBuf>,
    pub board_canvas: CanvasSize,
    /// The size of each of the two tray panels.
    pub tray_panel: CanvasSize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8080,
            name: None,
            interval_ms: 500,
            record: None,
            board_canvas: CanvasSize {
                width: 800.0,
                height: 800.0,
            },
            tray_panel: CanvasSize {
                width: 400.0,
                height: 700.0,
            },
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).map_err(|err| {
            anyhow::anyhow!("Could not open config file '{}': {}", path.display(), err)
        })?;
        let config: ViewerConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.interval_ms == 0 {
            anyhow::bail!("The autoplay interval must be at least 1 ms");
        }
        self.layouts()?;
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// The board layout for the configured canvas, and the tray geometry,
    /// whose icons are as large as the board cells.
    pub fn layouts(&self) -> anyhow::Result<(BoardLayout, TrayGeometry)> {
        let board = BoardLayout::for_canvas(self.board_canvas.width, self.board_canvas.height)?;
        let tray = TrayGeometry::new(
            self.tray_panel.width,
            self.tray_panel.height,
            board.cell_size(),
        );
        Ok((board, tray))
    }
}
