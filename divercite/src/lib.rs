pub use assets::*;
pub use board::*;
pub use coords::*;
pub use errors::*;
pub use history::*;
pub use interaction::*;
pub use outcome::*;
pub use pieces::*;
pub use protocol::*;
pub use render::*;
pub use session::*;
pub use snapshot::*;
pub use visualization::*;

#[cfg(test)]
mod arbitrary;
mod assets;
mod board;
mod coords;
mod errors;
mod history;
mod interaction;
mod outcome;
mod pieces;
mod protocol;
mod render;
mod session;
mod snapshot;
mod visualization;
