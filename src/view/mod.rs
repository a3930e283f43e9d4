// src/view/mod.rs

//! A view: one graph over one input, driven by a poll loop.
//!
//! The view owns its display, stream reader and analyzer. Display events
//! move the stream window; input readiness feeds the analyzer; peer
//! channels keep the windows of related views in step (see [`peers`]).

use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};

use crate::config::{AppearanceConfig, Config};
use crate::error::ViewError;
use crate::graph::{Analyzer, GraphKind};
use crate::os::poll::{PollFlags, PollRegistry};
use crate::os::process::reap_children;
use crate::platform::{window_title, Display, DisplayFactory, DisplaySettings, StatusLine, UiAction};
use crate::protocol::{PacketChannel, CommandPacket};
use crate::stream::{Input, ReadOutcome, StreamReader};

mod handlers;
pub mod peers;

pub use peers::{ClientHandle, Peer, SpawnOutcome};

pub type ViewRegistry = PollRegistry<ViewProcess>;

/// Everything a view needs besides its input and display.
#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub kind: GraphKind,
    /// File name passed on to detached views; `None` for standard input.
    pub input_path: Option<PathBuf>,
    pub offset: i64,
    pub block_size: u64,
    pub block_step: u64,
    pub read_chunk: usize,
    pub autoscroll: bool,
    pub autoscroll_interval: Duration,
    /// Views per session, this one included.
    pub max_views: usize,
    /// Quit once the input has no more data.
    pub stop_at_end: bool,
    pub appearance: AppearanceConfig,
}

impl ViewSettings {
    pub fn from_config(config: &Config) -> Self {
        ViewSettings {
            kind: config.view.graph,
            input_path: config.input.path.clone(),
            offset: config.input.offset,
            block_size: config.input.block_size,
            block_step: config.input.block_step.max(1),
            read_chunk: config.input.read_chunk,
            autoscroll: config.view.autoscroll,
            autoscroll_interval: Duration::from_millis(config.view.autoscroll_interval_ms.max(1)),
            max_views: config.view.max_views,
            stop_at_end: false,
            appearance: config.appearance.clone(),
        }
    }

    pub fn display_settings(&self, kind: GraphKind) -> DisplaySettings {
        let input = self
            .input_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let (graph_width, graph_height) = kind.intrinsic_size();
        DisplaySettings {
            title: window_title(&input, kind.name()),
            graph_width,
            graph_height,
            resizable: kind.resizable(),
            appearance: self.appearance.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// The display is gone; the view only relays packets until its last
    /// client hangs up.
    Quitting,
}

pub struct ViewProcess {
    settings: ViewSettings,
    kind: GraphKind,
    stream: StreamReader,
    analyzer: Box<dyn Analyzer>,
    display: Option<Box<dyn Display>>,
    display_factory: DisplayFactory,
    spawner: Option<PacketChannel>,
    clients: Vec<ClientHandle>,
    autoscroll: bool,
    exposed: bool,
    phase: Phase,
    status: StatusLine,
    fatal: Option<anyhow::Error>,
    /// Set in a freshly forked child until the action batch it inherited
    /// has been abandoned.
    forked: bool,
}

impl std::fmt::Debug for ViewProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewProcess")
            .field("kind", &self.kind)
            .field("stream", &self.stream)
            .field("phase", &self.phase)
            .field("autoscroll", &self.autoscroll)
            .field("clients", &self.clients.len())
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}

impl ViewProcess {
    pub fn new(settings: ViewSettings, input: Input, display_factory: DisplayFactory) -> Result<Self> {
        let kind = settings.kind;
        let display = display_factory(&settings.display_settings(kind))
            .with_context(|| format!("Failed to open a display for the {} view", kind))?;
        let stream = StreamReader::new(input, settings.offset, settings.block_size, settings.read_chunk);
        let analyzer = kind.build(&settings.appearance.palette);
        let mut view = ViewProcess {
            autoscroll: settings.autoscroll,
            settings,
            kind,
            stream,
            analyzer,
            display: Some(display),
            display_factory,
            spawner: None,
            clients: Vec::new(),
            exposed: false,
            phase: Phase::Running,
            status: StatusLine::default(),
            fatal: None,
            forked: false,
        };
        view.setup_analyzer();
        view.start_block()?;
        info!(
            "View {}: window {}+{} on fd {}",
            kind,
            view.stream.offset(),
            view.stream.window_size(),
            view.stream.fd()
        );
        Ok(view)
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    pub fn stream(&self) -> &StreamReader {
        &self.stream
    }

    pub fn analyzer(&self) -> &dyn Analyzer {
        self.analyzer.as_ref()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn autoscroll(&self) -> bool {
        self.autoscroll
    }

    /// Registers the display with `reg`. Call once before [`run`](Self::run)
    /// or [`turn`](Self::turn).
    pub fn install(&mut self, reg: &mut ViewRegistry) -> Result<()> {
        if let Some(fd) = self.display.as_ref().and_then(|d| d.event_fd()) {
            reg.register(fd, PollFlags::POLLIN, handlers::on_display)
                .context("Failed to watch the display connection")?;
        }
        Ok(())
    }

    /// Runs the event loop until nothing is left to wait for.
    pub fn run(&mut self, reg: &mut ViewRegistry) -> Result<()> {
        self.install(reg)?;
        while self.turn(reg)? {}
        info!("View {}: done", self.kind);
        Ok(())
    }

    /// One pass of the event loop. Returns `false` once the view has nothing
    /// left to wait for.
    pub fn turn(&mut self, reg: &mut ViewRegistry) -> Result<bool> {
        self.pump_display(reg);
        self.take_fatal()?;
        let ticking = self.autoscroll && self.phase == Phase::Running;
        if reg.is_empty() && !ticking {
            return Ok(false);
        }
        let timeout = ticking.then_some(self.settings.autoscroll_interval);
        match reg.wait(self, timeout) {
            Ok(0) => self.autoscroll_tick(reg)?,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e).context("Waiting for events failed"),
        }
        self.take_fatal()?;
        reap_children();
        self.finish_if_quitting(reg);
        Ok(true)
    }

    fn take_fatal(&mut self) -> Result<()> {
        match self.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Records an error raised inside a poll handler; the loop returns it.
    fn fail(&mut self, err: anyhow::Error) {
        warn!("View {}: {:#}", self.kind, err);
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    /// Handles every action the display has queued.
    fn pump_display(&mut self, reg: &mut ViewRegistry) {
        let Some(display) = self.display.as_mut() else {
            return;
        };
        self.forked = false;
        match display.poll_actions() {
            Ok(actions) => {
                let mut actions = actions.into_iter();
                while let Some(action) = actions.next() {
                    if let Err(e) = self.handle_action(action, reg) {
                        self.fail(e);
                        return;
                    }
                    // The rest of the batch belongs to the spawner.
                    if self.forked {
                        self.forked = false;
                        debug!(
                            "View {}: dropping {} actions queued before the fork",
                            self.kind,
                            actions.len()
                        );
                        return;
                    }
                }
            }
            Err(e) => self.fail(e.context("Reading display events failed")),
        }
    }

    pub fn handle_action(&mut self, action: UiAction, reg: &mut ViewRegistry) -> Result<()> {
        if self.phase != Phase::Running {
            trace!("View {}: ignoring {:?} while quitting", self.kind, action);
            return Ok(());
        }
        debug!("View {}: {:?}", self.kind, action);
        let offset = self.stream.offset();
        let size = self.stream.window_size();
        let step = self.settings.block_step;
        match action {
            UiAction::Quit => self.quit(reg)?,
            UiAction::Expose => {
                if !self.exposed {
                    self.exposed = true;
                    self.resume_input(reg);
                }
                self.refresh()?;
            }
            UiAction::StepForward => {
                let target = if self.autoscroll {
                    offset
                } else {
                    offset.saturating_add(size as i64)
                };
                self.navigate(target, size, reg)?;
                self.autoscroll = false;
            }
            UiAction::StepBack => {
                if !self.stream.is_seekable() {
                    debug!("View {}: input is not seekable, staying at {}", self.kind, offset);
                    return Ok(());
                }
                let target = offset.saturating_sub(size as i64).max(0);
                if target != offset {
                    self.navigate(target, size, reg)?;
                }
                self.autoscroll = false;
            }
            UiAction::Grow => self.navigate(offset, size.saturating_add(step), reg)?,
            UiAction::Shrink => {
                let target = size.saturating_sub(step).max(step);
                if target != size {
                    self.navigate(offset, target, reg)?;
                }
            }
            UiAction::Restart => {
                if self.stream.is_seekable() {
                    self.autoscroll = false;
                    self.navigate(0, size, reg)?;
                }
            }
            UiAction::ToggleAutoscroll => {
                self.autoscroll = !self.autoscroll;
                self.update_status()?;
            }
            UiAction::Spawn { kind, detached } => {
                let outcome = self.request_spawn(kind, detached, reg);
                debug!("View {}: spawn {} -> {:?}", self.kind, kind, outcome);
            }
            UiAction::Resize { width, height } => {
                if self.kind.resizable() {
                    self.analyzer.setup(size, (width, height));
                    self.restart_window(offset, reg)?;
                }
                self.refresh()?;
            }
        }
        Ok(())
    }

    /// Moves this view to `(offset, size)` and tells every peer.
    fn navigate(&mut self, offset: i64, size: u64, reg: &mut ViewRegistry) -> Result<()> {
        self.apply_window(offset, size, reg)?;
        let packet =
            CommandPacket::notify_read_at(self.stream.offset(), self.stream.window_size());
        self.broadcast(&packet, None);
        Ok(())
    }

    /// Moves this view to `(offset, size)` without telling anyone.
    pub(crate) fn apply_window(&mut self, offset: i64, size: u64, reg: &mut ViewRegistry) -> Result<()> {
        if size != self.stream.window_size() {
            self.stream.set_window_size(size);
            self.setup_analyzer();
        }
        self.restart_window(offset, reg)
    }

    fn setup_analyzer(&mut self) {
        let graph = match self.display.as_mut() {
            Some(display) => display.surface().graph_size(),
            None => self.kind.intrinsic_size(),
        };
        self.analyzer.setup(self.stream.window_size(), graph);
    }

    fn start_block(&mut self) -> Result<()> {
        let offset = self.stream.offset();
        if let Some(display) = self.display.as_mut() {
            self.analyzer.start_block(offset, display.surface())?;
        }
        self.update_status()
    }

    /// Starts a new window at `offset` and reads it from scratch.
    fn restart_window(&mut self, offset: i64, reg: &mut ViewRegistry) -> Result<()> {
        match self.stream.restart(offset) {
            Ok(()) => {}
            Err(ViewError::NotSeekable) => {
                debug!("View {}: continuing the stream in place", self.kind);
            }
            Err(e) => warn!("View {}: cannot move to {}: {}", self.kind, offset, e),
        }
        self.start_block()?;
        self.resume_input(reg);
        Ok(())
    }

    /// Watches the input again, once the window has been shown.
    fn resume_input(&mut self, reg: &mut ViewRegistry) {
        if !self.exposed || self.phase != Phase::Running || self.stream.is_exhausted() {
            return;
        }
        if let Err(e) = reg.register(self.stream.fd(), PollFlags::POLLIN, handlers::on_input) {
            self.fail(anyhow::Error::new(e).context("Failed to watch the input"));
        }
    }

    fn autoscroll_tick(&mut self, reg: &mut ViewRegistry) -> Result<()> {
        if !self.autoscroll || self.phase != Phase::Running || !self.stream.is_exhausted() {
            return Ok(());
        }
        let next = self
            .stream
            .offset()
            .saturating_add(self.stream.window_size() as i64);
        trace!("View {}: autoscroll to {}", self.kind, next);
        self.navigate(next, self.stream.window_size(), reg)
    }

    /// Feeds one chunk of input to the analyzer.
    pub(crate) fn read_input(&mut self, reg: &mut ViewRegistry) -> Result<()> {
        let Some(display) = self.display.as_mut() else {
            reg.unregister(self.stream.fd());
            return Ok(());
        };
        let outcome = self
            .stream
            .read_chunk(self.analyzer.as_mut(), display.surface())?;
        self.update_status()?;
        if outcome.is_settled() {
            reg.unregister(self.stream.fd());
            self.settle(outcome, reg)?;
        }
        Ok(())
    }

    fn settle(&mut self, outcome: ReadOutcome, reg: &mut ViewRegistry) -> Result<()> {
        info!(
            "View {}: {} | {}",
            self.kind, self.status.line1, self.status.line2
        );
        self.refresh()?;
        if outcome == ReadOutcome::Ended {
            self.autoscroll = false;
            if self.settings.stop_at_end {
                self.quit(reg)?;
            }
        }
        Ok(())
    }

    fn status_line(&self) -> StatusLine {
        let offset = self.stream.offset();
        let read = self.stream.bytes_read();
        let size = self.stream.window_size();
        let line1 = if read != size {
            format!("0x{:x} ({}/{})", offset, read, size)
        } else {
            format!("0x{:x} ({})", offset, size)
        };
        let mut line2 = offset.to_string();
        if !self.stream.is_seekable() {
            line2.push_str(" [not seekable]");
        }
        if self.autoscroll {
            line2.push_str(" [autoscroll]");
        }
        StatusLine { line1, line2 }
    }

    fn update_status(&mut self) -> Result<()> {
        self.status = self.status_line();
        if let Some(display) = self.display.as_mut() {
            display.set_status(&self.status)?;
        }
        Ok(())
    }

    /// Shows the graph area and status.
    fn refresh(&mut self) -> Result<()> {
        self.update_status()?;
        if let Some(display) = self.display.as_mut() {
            display.surface().present()?;
        }
        Ok(())
    }

    fn quit(&mut self, reg: &mut ViewRegistry) -> Result<()> {
        info!("View {}: quitting", self.kind);
        self.phase = Phase::Quitting;
        self.autoscroll = false;
        reg.unregister(self.stream.fd());
        if let Some(mut display) = self.display.take() {
            if let Some(fd) = display.event_fd() {
                reg.unregister(fd);
            }
            display.close()?;
        }
        self.finish_if_quitting(reg);
        Ok(())
    }

    pub(crate) fn display_fd(&self) -> Option<RawFd> {
        self.display.as_ref().and_then(|d| d.event_fd())
    }

    /// A quitting view stays around while it relays for its clients.
    fn finish_if_quitting(&mut self, reg: &mut ViewRegistry) {
        if self.phase != Phase::Quitting || !self.clients.is_empty() {
            return;
        }
        if let Some(spawner) = self.spawner.take() {
            debug!("View {}: leaving spawner", self.kind);
            reg.unregister(spawner.reader_fd());
        }
    }
}

#[cfg(test)]
mod tests;
