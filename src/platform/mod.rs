// src/platform/mod.rs
//
// The window-system side of a view: a drawing surface, an event source and a
// status area.

use std::os::unix::io::RawFd;

use anyhow::Result;

use crate::config::AppearanceConfig;
use crate::renderer::Surface;

pub mod actions;
pub mod headless;
#[cfg(feature = "x11")]
pub mod x11;

pub use actions::UiAction;
pub use headless::HeadlessDisplay;

/// Two lines of text shown under the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    pub line1: String,
    pub line2: String,
}

/// What a backend needs to open a window for a view.
#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub title: String,
    pub graph_width: u32,
    pub graph_height: u32,
    /// Whether the graph area follows the window size.
    pub resizable: bool,
    pub appearance: AppearanceConfig,
}

pub trait Display {
    /// Off-screen graph area the analyzers draw into.
    fn surface(&mut self) -> &mut dyn Surface;

    /// Descriptor to poll for window-system events, `None` for displays that
    /// only deliver injected actions.
    fn event_fd(&self) -> Option<RawFd>;

    /// Drains pending window-system events without blocking.
    fn poll_actions(&mut self) -> Result<Vec<UiAction>>;

    fn set_status(&mut self, status: &StatusLine) -> Result<()>;

    /// Closes the window and the connection.
    fn close(&mut self) -> Result<()>;

    /// Drops a connection inherited across `fork` without talking to the
    /// server; the parent process still owns it.
    fn abandon(self: Box<Self>);
}

/// Opens a display. A view keeps its factory so a forked child can open its
/// own window.
pub type DisplayFactory = fn(&DisplaySettings) -> Result<Box<dyn Display>>;

/// Window title for a view of `input`.
pub fn window_title(input: &str, graph: &str) -> String {
    format!("rawview: {}: ({})", input, graph)
}
