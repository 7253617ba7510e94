//! Terminal user interface.
//!
//! - `loop_runner` - main event loop and terminal management
//! - `input` - keyboard handling
//! - `events` - background task results
//! - `helpers` - spawning server calls and dispatching engine work
//! - `render` - layout and overlays
//! - `sidebar`, `items`, `status`, `help` - panels

mod events;
mod help;
mod helpers;
mod input;
mod items;
mod loop_runner;
mod render;
mod sidebar;
mod status;

pub use loop_runner::{run, Action};
