// src/graph/pair_grid.rs

//! Byte-pair ("continuation") grid: every adjacent pair `(prev, cur)` lights
//! the point `x = prev, y = cur`, reddening as the pair recurs.

use anyhow::Result;
use log::trace;

use super::{Analyzer, GraphKind};
use crate::analysis::FrequencyMatrix;
use crate::color::Palette;
use crate::renderer::{DrawBatch, Point, Surface};

/// Distinct heat colours a pair can take.
pub const HEAT_BUCKETS: usize = 256;

#[derive(Debug)]
pub struct PairGrid {
    palette: Palette,
    matrix: FrequencyMatrix,
    batch: DrawBatch<Point>,
}

impl PairGrid {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            matrix: FrequencyMatrix::new(),
            batch: DrawBatch::new(),
        }
    }

    pub fn matrix(&self) -> &FrequencyMatrix {
        &self.matrix
    }
}

impl Analyzer for PairGrid {
    fn kind(&self) -> GraphKind {
        GraphKind::Conti
    }

    fn start_block(&mut self, offset: i64, surface: &mut dyn Surface) -> Result<()> {
        trace!("PairGrid: start_block at {}", offset);
        self.matrix.reset();
        self.batch.invalidate();
        surface.clear(self.palette.background)
    }

    fn analyze(&mut self, buf: &[u8], surface: &mut dyn Surface) -> Result<()> {
        for pair in buf.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            self.matrix.observe(prev, cur);
            let bucket = self.matrix.intensity(prev, cur, HEAT_BUCKETS);
            let color = self.palette.heat(bucket, HEAT_BUCKETS);
            self.batch
                .push(surface, color, Point::new(prev as i32, cur as i32))?;
        }
        self.batch.flush(surface)
    }
}
