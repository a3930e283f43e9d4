// src/graph/mod.rs

//! The visualizations a view can run.
//!
//! Each graph implements [`Analyzer`]: it is told when a new window starts,
//! when the window size or graph area changes, and is then fed the window's
//! bytes chunk by chunk, painting as it goes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::analysis::Layout;
use crate::color::Palette;
use crate::renderer::Surface;

pub mod byte_grid;
pub mod density;
pub mod pair_grid;

pub use byte_grid::ByteGrid;
pub use density::DensityMap;
pub use pair_grid::PairGrid;

/// Width and height of the graph area the graphs are designed for.
pub const INTRINSIC_SIZE: (u32, u32) = (256, 256);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    /// Byte-pair frequency grid.
    #[default]
    Conti,
    /// One cell per byte of the window, laid out to fill the graph area.
    Bytes,
    /// 256×256 map of byte classes in stream order.
    Bytemap,
}

impl GraphKind {
    pub const ALL: [GraphKind; 3] = [GraphKind::Conti, GraphKind::Bytes, GraphKind::Bytemap];

    pub fn name(self) -> &'static str {
        match self {
            GraphKind::Conti => "conti",
            GraphKind::Bytes => "bytes",
            GraphKind::Bytemap => "bytemap",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn index(self) -> usize {
        match self {
            GraphKind::Conti => 0,
            GraphKind::Bytes => 1,
            GraphKind::Bytemap => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn intrinsic_size(self) -> (u32, u32) {
        INTRINSIC_SIZE
    }

    /// Whether the graph follows the window size.
    pub fn resizable(self) -> bool {
        matches!(self, GraphKind::Bytes)
    }

    pub fn build(self, palette: &Palette) -> Box<dyn Analyzer> {
        match self {
            GraphKind::Conti => Box::new(PairGrid::new(palette.clone())),
            GraphKind::Bytes => Box::new(ByteGrid::new(palette.clone())),
            GraphKind::Bytemap => Box::new(DensityMap::new(palette.clone())),
        }
    }
}

impl std::fmt::Display for GraphKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Analyzer {
    fn kind(&self) -> GraphKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Forgets everything drawn and accumulated; the next bytes belong to
    /// the window starting at `offset`.
    fn start_block(&mut self, offset: i64, surface: &mut dyn Surface) -> Result<()>;

    /// Recomputes layout for windows of `item_count` bytes in a graph area of
    /// `graph` pixels.
    fn setup(&mut self, _item_count: u64, _graph: (u32, u32)) {}

    /// Consumes one chunk of the current window.
    fn analyze(&mut self, buf: &[u8], surface: &mut dyn Surface) -> Result<()>;

    /// The cell layout, for graphs that place bytes with one.
    fn cell_layout(&self) -> Option<&Layout> {
        None
    }
}

#[cfg(test)]
mod tests;
