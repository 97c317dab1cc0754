//! Last-drawn cell cache shared by both renderer strategies.
//!
//! Stores one hash per cell describing the *painted output*, not the raw
//! cell, so content that folds to the same pixels (empty string vs single
//! space, identical effective colors) compares equal. The cache is keyed by
//! grid geometry: any dimension change drops every entry, because a hash
//! computed under old dimensions indexes the wrong cell under new ones.

use ahash::AHasher;
use core_grid::{Cell, Grid};
use std::hash::{Hash, Hasher};

#[derive(Debug, Default)]
pub struct LastDrawnCache {
    cols: u16,
    rows: u16,
    hashes: Vec<Option<u64>>,
}

impl LastDrawnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the cache matches the grid's geometry. Returns true when the
    /// cache was reset (cold start or resize); every comparison afterward
    /// misses, forcing repaints.
    pub fn ensure_dims(&mut self, grid: &Grid) -> bool {
        if self.cols == grid.cols() && self.rows == grid.rows() {
            return false;
        }
        self.cols = grid.cols();
        self.rows = grid.rows();
        self.hashes.clear();
        self.hashes
            .resize(self.cols as usize * self.rows as usize, None);
        true
    }

    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.cols as usize + x as usize
    }

    pub fn get(&self, x: u16, y: u16) -> Option<u64> {
        self.hashes.get(self.index(x, y)).copied().flatten()
    }

    pub fn set(&mut self, x: u16, y: u16, hash: u64) {
        let idx = self.index(x, y);
        if let Some(slot) = self.hashes.get_mut(idx) {
            *slot = Some(hash);
        }
    }
}

/// Hash of a cell's painted output against the grid's current defaults.
///
/// Background-only cells (empty or space glyph) hash identically: the glyph
/// is normalized to a space and the foreground color is dropped, since
/// neither affects the pixels.
pub fn painted_cell_hash(grid: &Grid, cell: &Cell) -> u64 {
    let mut hasher = AHasher::default();
    let visible = cell.has_foreground_glyph();
    let text: &str = if visible { &cell.glyph } else { " " };
    text.hash(&mut hasher);
    if visible {
        cell.fg.unwrap_or(grid.default_fg).0.hash(&mut hasher);
    }
    cell.bg.unwrap_or(grid.default_bg).0.hash(&mut hasher);
    cell.flags.bits().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_grid::Color;

    #[test]
    fn empty_and_space_hash_identically() {
        let grid = Grid::new(2, 1);
        let empty = Cell::default();
        let space = Cell {
            glyph: " ".into(),
            ..Cell::default()
        };
        assert_eq!(
            painted_cell_hash(&grid, &empty),
            painted_cell_hash(&grid, &space)
        );
    }

    #[test]
    fn foreground_color_ignored_for_background_only_cells() {
        let grid = Grid::new(1, 1);
        let plain = Cell::default();
        let tinted = Cell {
            fg: Some(Color(0xff0000)),
            ..Cell::default()
        };
        assert_eq!(
            painted_cell_hash(&grid, &plain),
            painted_cell_hash(&grid, &tinted)
        );
    }

    #[test]
    fn default_color_change_changes_hash() {
        let mut grid = Grid::new(1, 1);
        let cell = Cell {
            glyph: "x".into(),
            ..Cell::default()
        };
        let before = painted_cell_hash(&grid, &cell);
        grid.default_fg = Color(0x123456);
        assert_ne!(before, painted_cell_hash(&grid, &cell));
    }

    #[test]
    fn ensure_dims_resets_on_resize_only() {
        let mut cache = LastDrawnCache::new();
        let mut grid = Grid::new(4, 2);
        assert!(cache.ensure_dims(&grid), "cold start resets");
        cache.set(3, 1, 42);
        assert!(!cache.ensure_dims(&grid), "same geometry keeps entries");
        assert_eq!(cache.get(3, 1), Some(42));
        grid.resize(5, 2);
        assert!(cache.ensure_dims(&grid));
        assert_eq!(cache.get(3, 1), None, "resize drops all entries");
    }
}
