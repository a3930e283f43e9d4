// src/graph/density.rs

//! Fixed 256×256 map: the `i`-th byte of a window lands on
//! `(i % 256, i / 256)`, coloured by its class.

use anyhow::Result;
use log::trace;

use super::{Analyzer, GraphKind};
use crate::analysis::classify;
use crate::color::Palette;
use crate::renderer::{DrawBatch, Point, Surface};

const SIDE: u64 = 256;
const CAPACITY: u64 = SIDE * SIDE;

#[derive(Debug)]
pub struct DensityMap {
    palette: Palette,
    cursor: u64,
    batch: DrawBatch<Point>,
}

impl DensityMap {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            cursor: 0,
            batch: DrawBatch::new(),
        }
    }

    /// Number of bytes placed since the last `start_block`.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_full(&self) -> bool {
        self.cursor >= CAPACITY
    }
}

impl Analyzer for DensityMap {
    fn kind(&self) -> GraphKind {
        GraphKind::Bytemap
    }

    fn start_block(&mut self, offset: i64, surface: &mut dyn Surface) -> Result<()> {
        trace!("DensityMap: start_block at {}", offset);
        self.cursor = 0;
        self.batch.invalidate();
        surface.clear(self.palette.background)
    }

    fn analyze(&mut self, buf: &[u8], surface: &mut dyn Surface) -> Result<()> {
        for &byte in buf {
            if self.is_full() {
                break;
            }
            let color = self.palette.class_color(classify(byte));
            let point = Point::new((self.cursor % SIDE) as i32, (self.cursor / SIDE) as i32);
            self.batch.push(surface, color, point)?;
            self.cursor += 1;
        }
        self.batch.flush(surface)
    }
}
