// src/analysis/layout.rs

//! Cell layout for a fixed number of items inside a viewport.
//!
//! [`Layout::solve`] looks for the largest cells that still let every item
//! fit. It starts from 1×1 cells and hill-climbs in three directions (wider
//! cells, taller cells, one column fewer), dropping a direction the first time
//! a step would overflow the viewport height. Leftover height is spread over
//! the first rows so the grid reaches the bottom edge.

use log::trace;

use crate::renderer::Rect;

/// Width left unused at the right edge before one more, partially visible,
/// column is added.
const MAX_UNDRAWN_WIDTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub items: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub items_per_row: u32,
    /// Height left over below the grid, handed out to the first rows.
    pub vertical_fill: u32,
    /// Extra height each row absorbs until `vertical_fill` runs out.
    pub vertical_step: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    cell_width: u32,
    cell_height: u32,
    items_per_row: u32,
}

/// Columns for cells `cell_width` wide, rounding up when more than
/// [`MAX_UNDRAWN_WIDTH`] pixels would stay empty.
fn columns_for(width: u32, cell_width: u32) -> u32 {
    let mut columns = width / cell_width;
    if width - columns * cell_width > MAX_UNDRAWN_WIDTH {
        columns += 1;
    }
    columns.max(1)
}

fn rows_for(items: u64, items_per_row: u32) -> u64 {
    items.div_ceil(items_per_row as u64)
}

fn grid_height(items: u64, c: Candidate) -> u64 {
    rows_for(items, c.items_per_row) * c.cell_height as u64
}

impl Layout {
    pub fn solve(items: u64, width: u32, height: u32) -> Layout {
        let items = items.max(1);
        let width = width.max(1);
        let height = height.max(1);
        let fits = |c: Candidate| grid_height(items, c) <= height as u64;

        let mut best = Candidate {
            cell_width: 1,
            cell_height: 1,
            items_per_row: columns_for(width, 1),
        };
        let start_fits = fits(best);
        let mut grow_width = start_fits;
        let mut grow_height = start_fits;
        let mut drop_column = start_fits;
        if !start_fits {
            trace!(
                "Layout: {} items overflow {}x{} even with 1x1 cells",
                items,
                width,
                height
            );
        }

        while grow_width || grow_height || drop_column {
            if grow_width {
                if best.cell_width >= width {
                    grow_width = false;
                } else {
                    let cell_width = best.cell_width + 1;
                    let next = Candidate {
                        cell_width,
                        items_per_row: columns_for(width, cell_width),
                        ..best
                    };
                    if fits(next) {
                        best = next;
                    } else {
                        grow_width = false;
                    }
                }
            }
            if grow_height {
                let next = Candidate {
                    cell_height: best.cell_height + 1,
                    ..best
                };
                if fits(next) {
                    best = next;
                } else {
                    grow_height = false;
                }
            }
            if drop_column {
                if best.items_per_row <= 1 {
                    drop_column = false;
                } else {
                    let items_per_row = best.items_per_row - 1;
                    let next = Candidate {
                        cell_width: best.cell_width.max(width / items_per_row),
                        items_per_row,
                        ..best
                    };
                    if fits(next) {
                        best = next;
                    } else {
                        drop_column = false;
                    }
                }
            }
        }

        let required = grid_height(items, best);
        let rows = rows_for(items, best.items_per_row);
        let vertical_fill = (height as u64).saturating_sub(required) as u32;
        let vertical_step = if vertical_fill == 0 {
            0
        } else {
            vertical_fill.div_ceil(rows.min(u32::MAX as u64) as u32)
        };

        let layout = Layout {
            items,
            viewport_width: width,
            viewport_height: height,
            cell_width: best.cell_width,
            cell_height: best.cell_height,
            items_per_row: best.items_per_row,
            vertical_fill,
            vertical_step,
        };
        trace!("Layout: solved {:?}", layout);
        layout
    }

    pub fn rows(&self) -> u64 {
        rows_for(self.items, self.items_per_row)
    }

    /// Height of the grid before the vertical fill is applied.
    pub fn required_height(&self) -> u64 {
        self.rows() * self.cell_height as u64
    }

    pub fn fits(&self) -> bool {
        self.required_height() <= self.viewport_height as u64
    }

    fn extra_before(&self, row: u64) -> u64 {
        (row * self.vertical_step as u64).min(self.vertical_fill as u64)
    }

    /// Top edge of `row`, including the stretch of the rows above it.
    pub fn row_top(&self, row: u64) -> u64 {
        row * self.cell_height as u64 + self.extra_before(row)
    }

    pub fn row_height(&self, row: u64) -> u32 {
        let extra = self.extra_before(row + 1) - self.extra_before(row);
        self.cell_height + extra as u32
    }

    /// Rectangle of the `index`-th item.
    pub fn cell(&self, index: u64) -> Rect {
        let row = index / self.items_per_row as u64;
        let col = index % self.items_per_row as u64;
        Rect::new(
            clamp_coord(col * self.cell_width as u64),
            clamp_coord(self.row_top(row)),
            self.cell_width,
            self.row_height(row),
        )
    }

    /// Width actually covered by the columns, capped at the viewport.
    pub fn grid_width(&self) -> u32 {
        let full = self.items_per_row as u64 * self.cell_width as u64;
        full.min(self.viewport_width as u64) as u32
    }

    /// Parts of the viewport not covered once `placed` items are drawn: the
    /// slack right of the columns, the rest of a partial last row, and
    /// everything below.
    pub fn unused_regions(&self, placed: u64) -> Vec<Rect> {
        let placed = placed.min(self.items);
        let per_row = self.items_per_row as u64;
        let rows_used = placed.div_ceil(per_row);
        let full_rows = placed / per_row;
        let grid_width = self.grid_width();
        let mut regions = Vec::with_capacity(3);

        if rows_used > 0 && grid_width < self.viewport_width {
            regions.push(Rect::new(
                grid_width as i32,
                0,
                self.viewport_width - grid_width,
                self.row_top(rows_used).min(self.viewport_height as u64) as u32,
            ));
        }

        let remainder = placed % per_row;
        if remainder > 0 {
            let x = (remainder * self.cell_width as u64).min(grid_width as u64) as u32;
            if x < grid_width {
                regions.push(Rect::new(
                    x as i32,
                    clamp_coord(self.row_top(full_rows)),
                    grid_width - x,
                    self.row_height(full_rows),
                ));
            }
        }

        let below = self.row_top(rows_used);
        if below < self.viewport_height as u64 {
            regions.push(Rect::new(
                0,
                clamp_coord(below),
                self.viewport_width,
                self.viewport_height - below as u32,
            ));
        }

        regions.retain(|r| !r.is_empty());
        regions
    }
}

fn clamp_coord(v: u64) -> i32 {
    v.min(i32::MAX as u64) as i32
}
