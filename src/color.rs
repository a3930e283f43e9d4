// src/color.rs

//! Colors and the graph palette.
//!
//! The palette has one background slot and ten graph slots. Byte classes map
//! onto the graph slots; slot 6 marks grid area no byte was drawn into.

use serde::{Deserialize, Serialize};

use crate::analysis::classify::ByteClass;

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`, the pixel value on a 24-bit TrueColor visual.
    pub fn to_pixel(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// Number of graph (foreground) slots in a [`Palette`].
pub const GRAPH_SLOTS: usize = 10;

/// Graph slot used for the part of the grid no byte landed in.
pub const UNUSED_SLOT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: Color,
    pub border: Color,
    pub graph: [Color; GRAPH_SLOTS],
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            background: Color::BLACK,
            border: Color::rgb(0x5f, 0x5f, 0x5f),
            graph: [
                Color::rgb(0x7f, 0x7f, 0x7f), // whitespace
                Color::rgb(0x82, 0x00, 0x8e), // control
                Color::rgb(0xea, 0x00, 0xff), // line end
                Color::rgb(0x10, 0x00, 0xa9), // digit
                Color::rgb(0x18, 0x00, 0xff), // identifier
                Color::rgb(0x00, 0xe4, 0xff), // punctuation
                Color::rgb(0x00, 0xff, 0x3c), // unused grid area
                Color::rgb(0xea, 0xff, 0x00), // other
                Color::rgb(0xff, 0x84, 0x00), // DEL
                Color::rgb(0xff, 0x00, 0x00), // high bit
            ],
        }
    }
}

impl Palette {
    pub fn class_color(&self, class: ByteClass) -> Color {
        match class.graph_slot() {
            Some(slot) => self.graph[slot],
            None => self.background,
        }
    }

    pub fn unused(&self) -> Color {
        self.graph[UNUSED_SLOT]
    }

    /// Color for a pair-frequency intensity bucket.
    ///
    /// Starting from the whitespace gray, frequent pairs turn red: red is
    /// lightened by four per observation, green and blue darkened by half.
    pub fn heat(&self, bucket: usize, buckets: usize) -> Color {
        let buckets = buckets.max(1);
        let count = (bucket.min(buckets - 1) * 256 / buckets) as u32;
        let base = self.graph[0];
        Color {
            r: lighten(base.r, count * 4),
            g: darken(base.g, count / 2),
            b: darken(base.b, count / 2),
        }
    }
}

fn lighten(channel: u8, by: u32) -> u8 {
    (channel as u32 + by).min(255) as u8
}

fn darken(channel: u8, by: u32) -> u8 {
    (channel as u32).saturating_sub(by) as u8
}
