//! The cell grid and scroll-region geometry.

use crate::cell::{Cell, Color};

/// Bounds for the next scroll command, all edges inclusive. Set by one
/// command, consumed by exactly one scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegion {
    pub top: u16,
    pub bottom: u16,
    pub left: u16,
    pub right: u16,
}

/// Authoritative display replica: `rows` x `cols` cells, cursor position,
/// and the default colors used when a cell does not override them.
///
/// Dimensions change only through `resize`, which reallocates and resets
/// every cell; a grid with stale cells at new dimensions is never
/// observable between commands.
#[derive(Debug, Clone)]
pub struct Grid {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    pub cursor_row: u16,
    pub cursor_col: u16,
    pub default_fg: Color,
    pub default_bg: Color,
}

impl Grid {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); cols as usize * rows as usize],
            cursor_row: 0,
            cursor_col: 0,
            default_fg: Color(0xff_ff_ff),
            default_bg: Color(0x00_00_00),
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.cols && y < self.rows
    }

    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.cols as usize + x as usize
    }

    /// Cell at (x, y). Callers index within bounds; out-of-range is a logic
    /// error upstream, so this panics in tests rather than masking it.
    pub fn cell(&self, x: u16, y: u16) -> &Cell {
        &self.cells[self.index(x, y)]
    }

    pub fn cell_mut(&mut self, x: u16, y: u16) -> &mut Cell {
        let idx = self.index(x, y);
        &mut self.cells[idx]
    }

    /// Reallocate to new dimensions. All prior content is invalid afterward;
    /// cursor returns to the origin.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![Cell::default(); cols as usize * rows as usize];
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    /// Reset every cell to the default (empty) cell, keeping dimensions.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Clamp a scroll region to the current dimensions so interpreter code
    /// can iterate it without per-cell bounds checks.
    pub fn clamp_region(&self, region: ScrollRegion) -> Option<ScrollRegion> {
        if self.cols == 0 || self.rows == 0 {
            return None;
        }
        let clamped = ScrollRegion {
            top: region.top.min(self.rows - 1),
            bottom: region.bottom.min(self.rows - 1),
            left: region.left.min(self.cols - 1),
            right: region.right.min(self.cols - 1),
        };
        (clamped.top <= clamped.bottom && clamped.left <= clamped.right).then_some(clamped)
    }

    /// Whole grid as a scroll region (default when none was set).
    pub fn full_region(&self) -> Option<ScrollRegion> {
        if self.cols == 0 || self.rows == 0 {
            return None;
        }
        Some(ScrollRegion {
            top: 0,
            bottom: self.rows - 1,
            left: 0,
            right: self.cols - 1,
        })
    }

    /// Debug/test helper: row content as a string with empty glyphs rendered
    /// as spaces.
    pub fn row_text(&self, y: u16) -> String {
        (0..self.cols)
            .map(|x| {
                let g = self.cell(x, y).glyph.as_str();
                if g.is_empty() { " ".to_string() } else { g.to_string() }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_resets_cells_and_cursor() {
        let mut g = Grid::new(4, 2);
        g.cell_mut(3, 1).glyph = "x".into();
        g.cursor_col = 3;
        g.resize(2, 3);
        assert_eq!((g.cols(), g.rows()), (2, 3));
        assert_eq!((g.cursor_row, g.cursor_col), (0, 0));
        for y in 0..3 {
            for x in 0..2 {
                assert_eq!(g.cell(x, y), &Cell::default());
            }
        }
    }

    #[test]
    fn clamp_region_respects_bounds() {
        let g = Grid::new(10, 5);
        let r = g
            .clamp_region(ScrollRegion {
                top: 2,
                bottom: 99,
                left: 0,
                right: 99,
            })
            .expect("region");
        assert_eq!(r.bottom, 4);
        assert_eq!(r.right, 9);
        assert!(
            g.clamp_region(ScrollRegion {
                top: 4,
                bottom: 1,
                left: 0,
                right: 3
            })
            .is_none(),
            "inverted region is rejected"
        );
    }
}
