// src/renderer.rs

//! Drawing primitives shared by the graphs and the display backends.
//!
//! A [`Surface`] is the off-screen graph area of a view: graphs clear
//! regions, pick a color and emit batches of points or filled rectangles;
//! [`Surface::present`] copies the composed area to the visible window.
//! [`DrawBatch`] groups consecutive same-colored primitives into one call.

use anyhow::Result;
use log::trace;

use crate::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && ((p.x - self.x) as i64) < self.width as i64
            && ((p.y - self.y) as i64) < self.height as i64
    }
}

/// The drawing half of a display: an off-screen graph area plus a way to
/// show it.
pub trait Surface {
    /// Size of the graph area in pixels.
    fn graph_size(&self) -> (u32, u32);

    /// Fills `rect` with `color` without touching the current draw color.
    fn clear_region(&mut self, rect: Rect, color: Color) -> Result<()>;

    fn set_draw_color(&mut self, color: Color) -> Result<()>;

    fn draw_points(&mut self, points: &[Point]) -> Result<()>;

    fn fill_rects(&mut self, rects: &[Rect]) -> Result<()>;

    /// Copies the off-screen graph area to the window.
    fn present(&mut self) -> Result<()>;

    /// Clears the whole graph area.
    fn clear(&mut self, color: Color) -> Result<()> {
        let (w, h) = self.graph_size();
        self.clear_region(Rect::new(0, 0, w, h), color)
    }
}

/// A primitive that can be drawn in bulk.
pub trait Primitive: Copy + std::fmt::Debug {
    /// Largest batch handed to the surface at once.
    const BATCH: usize;

    fn draw(surface: &mut dyn Surface, batch: &[Self]) -> Result<()>;
}

impl Primitive for Point {
    const BATCH: usize = 2048;

    fn draw(surface: &mut dyn Surface, batch: &[Self]) -> Result<()> {
        surface.draw_points(batch)
    }
}

impl Primitive for Rect {
    const BATCH: usize = 1024;

    fn draw(surface: &mut dyn Surface, batch: &[Self]) -> Result<()> {
        surface.fill_rects(batch)
    }
}

/// Accumulates primitives of one color and flushes them when the color
/// changes or the batch is full.
#[derive(Debug)]
pub struct DrawBatch<T: Primitive> {
    color: Option<Color>,
    pending: Vec<T>,
}

impl<T: Primitive> Default for DrawBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Primitive> DrawBatch<T> {
    pub fn new() -> Self {
        Self {
            color: None,
            pending: Vec::with_capacity(T::BATCH),
        }
    }

    pub fn push(&mut self, surface: &mut dyn Surface, color: Color, item: T) -> Result<()> {
        if self.color != Some(color) {
            self.flush(surface)?;
            surface.set_draw_color(color)?;
            self.color = Some(color);
        }
        self.pending.push(item);
        if self.pending.len() >= T::BATCH {
            self.flush(surface)?;
        }
        Ok(())
    }

    pub fn flush(&mut self, surface: &mut dyn Surface) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        trace!("DrawBatch: flushing {} primitives", self.pending.len());
        T::draw(surface, &self.pending)?;
        self.pending.clear();
        Ok(())
    }

    /// Forgets the current color, e.g. after someone else drew on the surface.
    pub fn invalidate(&mut self) {
        self.color = None;
    }
}

#[cfg(test)]
mod tests;
