// src/graph/byte_grid.rs

//! One cell per byte of the window, sized by [`Layout::solve`] so the whole
//! window fills the graph area. The part of the area no byte reached yet is
//! painted in the palette's "unused" colour.

use anyhow::Result;
use log::{debug, trace};

use super::{Analyzer, GraphKind, INTRINSIC_SIZE};
use crate::analysis::{classify, Layout};
use crate::color::Palette;
use crate::renderer::{DrawBatch, Rect, Surface};

const DEFAULT_ITEMS: u64 = 1024;

#[derive(Debug)]
pub struct ByteGrid {
    palette: Palette,
    layout: Layout,
    placed: u64,
    batch: DrawBatch<Rect>,
}

impl ByteGrid {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            layout: Layout::solve(DEFAULT_ITEMS, INTRINSIC_SIZE.0, INTRINSIC_SIZE.1),
            placed: 0,
            batch: DrawBatch::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn placed(&self) -> u64 {
        self.placed
    }

    fn paint_unused(&mut self, surface: &mut dyn Surface) -> Result<()> {
        let regions = self.layout.unused_regions(self.placed);
        if regions.is_empty() {
            return Ok(());
        }
        surface.set_draw_color(self.palette.unused())?;
        surface.fill_rects(&regions)?;
        self.batch.invalidate();
        Ok(())
    }
}

impl Analyzer for ByteGrid {
    fn kind(&self) -> GraphKind {
        GraphKind::Bytes
    }

    fn start_block(&mut self, offset: i64, surface: &mut dyn Surface) -> Result<()> {
        trace!("ByteGrid: start_block at {}", offset);
        self.placed = 0;
        self.batch.invalidate();
        surface.clear(self.palette.background)
    }

    fn setup(&mut self, item_count: u64, graph: (u32, u32)) {
        self.layout = Layout::solve(item_count, graph.0, graph.1);
        debug!(
            "ByteGrid: {} bytes in {}x{} -> cells {}x{}, {} per row",
            item_count,
            graph.0,
            graph.1,
            self.layout.cell_width,
            self.layout.cell_height,
            self.layout.items_per_row
        );
    }

    fn analyze(&mut self, buf: &[u8], surface: &mut dyn Surface) -> Result<()> {
        for &byte in buf {
            if self.placed >= self.layout.items {
                trace!("ByteGrid: window of {} bytes is full", self.layout.items);
                break;
            }
            let color = self.palette.class_color(classify(byte));
            let cell = self.layout.cell(self.placed);
            self.batch.push(surface, color, cell)?;
            self.placed += 1;
        }
        self.batch.flush(surface)?;
        self.paint_unused(surface)
    }

    fn cell_layout(&self) -> Option<&Layout> {
        Some(&self.layout)
    }
}
