// src/platform/headless.rs

//! A display without a window system. It keeps an in-memory framebuffer of
//! the graph area, records draw calls and serves actions queued by its owner.

use std::collections::VecDeque;
use std::os::unix::io::RawFd;

use anyhow::Result;
use log::{debug, trace};

use super::{Display, DisplaySettings, StatusLine, UiAction};
use crate::color::Color;
use crate::renderer::{Point, Rect, Surface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommand {
    Clear(Rect, Color),
    SetColor(Color),
    Points(Vec<Point>),
    Rects(Vec<Rect>),
    Present,
}

#[derive(Debug)]
pub struct HeadlessDisplay {
    width: u32,
    height: u32,
    framebuffer: Vec<Color>,
    draw_color: Color,
    record: bool,
    commands: Vec<DrawCommand>,
    actions: VecDeque<UiAction>,
    status: StatusLine,
    presents: usize,
    closed: bool,
}

impl HeadlessDisplay {
    /// A display with a `width`×`height` graph area. Like a freshly mapped
    /// window, it reports one expose event first.
    pub fn new(width: u32, height: u32) -> Self {
        let mut actions = VecDeque::new();
        actions.push_back(UiAction::Expose);
        Self {
            width,
            height,
            framebuffer: vec![Color::BLACK; width as usize * height as usize],
            draw_color: Color::BLACK,
            record: true,
            commands: Vec::new(),
            actions,
            status: StatusLine::default(),
            presents: 0,
            closed: false,
        }
    }

    /// Stops keeping a log of draw calls; the framebuffer is still updated.
    pub fn without_recording(mut self) -> Self {
        self.record = false;
        self
    }

    /// [`DisplayFactory`](super::DisplayFactory) for headless views.
    pub fn open(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
        debug!(
            "HeadlessDisplay: opening '{}' ({}x{})",
            settings.title, settings.graph_width, settings.graph_height
        );
        Ok(Box::new(Self::new(settings.graph_width, settings.graph_height)))
    }

    /// Like [`HeadlessDisplay::open`], without the draw log.
    pub fn open_unrecorded(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
        Ok(Box::new(
            Self::new(settings.graph_width, settings.graph_height).without_recording(),
        ))
    }

    pub fn push_action(&mut self, action: UiAction) {
        self.actions.push_back(action);
    }

    /// Resizes the graph area and reports it like a window manager would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.framebuffer = vec![Color::BLACK; width as usize * height as usize];
        self.actions.push_back(UiAction::Resize { width, height });
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y).map(|i| self.framebuffer[i])
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn presents(&self) -> usize {
        self.presents
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        let x0 = rect.x.max(0) as i64;
        let y0 = rect.y.max(0) as i64;
        let x1 = (rect.x as i64 + rect.width as i64).min(self.width as i64);
        let y1 = (rect.y as i64 + rect.height as i64).min(self.height as i64);
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for x in x0..x1 {
                self.framebuffer[row + x as usize] = color;
            }
        }
    }

    fn log(&mut self, command: DrawCommand) {
        if self.record {
            self.commands.push(command);
        }
    }
}

impl Surface for HeadlessDisplay {
    fn graph_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear_region(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.fill(rect, color);
        self.log(DrawCommand::Clear(rect, color));
        Ok(())
    }

    fn set_draw_color(&mut self, color: Color) -> Result<()> {
        self.draw_color = color;
        self.log(DrawCommand::SetColor(color));
        Ok(())
    }

    fn draw_points(&mut self, points: &[Point]) -> Result<()> {
        for p in points {
            if let Some(i) = self.index(p.x, p.y) {
                self.framebuffer[i] = self.draw_color;
            }
        }
        self.log(DrawCommand::Points(points.to_vec()));
        Ok(())
    }

    fn fill_rects(&mut self, rects: &[Rect]) -> Result<()> {
        let color = self.draw_color;
        for rect in rects {
            self.fill(*rect, color);
        }
        self.log(DrawCommand::Rects(rects.to_vec()));
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.presents += 1;
        self.log(DrawCommand::Present);
        Ok(())
    }
}

impl Display for HeadlessDisplay {
    fn surface(&mut self) -> &mut dyn Surface {
        self
    }

    fn event_fd(&self) -> Option<RawFd> {
        None
    }

    fn poll_actions(&mut self) -> Result<Vec<UiAction>> {
        Ok(self.actions.drain(..).collect())
    }

    fn set_status(&mut self, status: &StatusLine) -> Result<()> {
        trace!("HeadlessDisplay: status '{}' / '{}'", status.line1, status.line2);
        self.status = status.clone();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.actions.clear();
        Ok(())
    }

    fn abandon(self: Box<Self>) {
        trace!("HeadlessDisplay: abandoned");
    }
}
