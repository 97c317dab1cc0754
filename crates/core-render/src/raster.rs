//! Immediate-mode raster strategy: per-cell terminal command emission.
//!
//! Paints each dirty cell with a cursor move, color/attribute set, and a
//! one-cell print, queued into the caller's writer and flushed once per
//! pass. Ordering is row-major so the output stream is deterministic and
//! diffable in tests (the dirty snapshot itself is unordered).

use crate::cache::{LastDrawnCache, painted_cell_hash};
use crate::{RenderStats, Renderer};
use anyhow::Result;
use core_grid::{Cell, CellFlags, Color, DirtyTracker, Grid};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{
        Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
        Color as CtColor,
    },
};
use std::io::Write;
use tracing::trace;

pub struct RasterRenderer<W: Write> {
    out: W,
    cache: LastDrawnCache,
}

impl<W: Write> RasterRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            cache: LastDrawnCache::new(),
        }
    }

    /// Reclaim the writer (tests inspect the emitted byte stream).
    pub fn into_writer(self) -> W {
        self.out
    }

    fn paint(&mut self, grid: &Grid, x: u16, y: u16, cell: &Cell) -> Result<()> {
        let bg = cell.bg.unwrap_or(grid.default_bg);
        queue!(
            self.out,
            MoveTo(x, y),
            SetBackgroundColor(to_ct(bg))
        )?;
        for (bit, attr) in [
            (CellFlags::BOLD, Attribute::Bold),
            (CellFlags::ITALIC, Attribute::Italic),
            (CellFlags::UNDERLINE, Attribute::Underlined),
            (CellFlags::REVERSE, Attribute::Reverse),
            (CellFlags::UNDERCURL, Attribute::Undercurled),
        ] {
            if cell.flags.contains(bit) {
                queue!(self.out, SetAttribute(attr))?;
            }
        }
        if cell.has_foreground_glyph() {
            let fg = cell.fg.unwrap_or(grid.default_fg);
            queue!(self.out, SetForegroundColor(to_ct(fg)), Print(cell.glyph.as_str()))?;
        } else {
            // Background-only: empty string and space paint the same cell.
            queue!(self.out, Print(" "))?;
        }
        queue!(self.out, SetAttribute(Attribute::Reset), ResetColor)?;
        Ok(())
    }
}

fn to_ct(color: Color) -> CtColor {
    CtColor::Rgb {
        r: color.r(),
        g: color.g(),
        b: color.b(),
    }
}

impl<W: Write> Renderer for RasterRenderer<W> {
    fn render(&mut self, grid: &Grid, dirty: &mut DirtyTracker) -> Result<RenderStats> {
        let cache_reset = self.cache.ensure_dims(grid);
        if cache_reset {
            trace!(target: "render.raster", cols = grid.cols(), rows = grid.rows(), "cache_reset");
        }
        let mut snap = dirty.snapshot();
        snap.sort_unstable_by_key(|c| (c.y, c.x));

        let mut stats = RenderStats::default();
        for entry in snap {
            if !grid.in_bounds(entry.x, entry.y) {
                // Mark from before a shrink; nothing to draw there anymore.
                dirty.ack(&entry);
                continue;
            }
            let cell = grid.cell(entry.x, entry.y);
            let hash = painted_cell_hash(grid, cell);
            if self.cache.get(entry.x, entry.y) == Some(hash) {
                stats.cells_skipped += 1;
                dirty.ack(&entry);
                continue;
            }
            self.paint(grid, entry.x, entry.y, cell)?;
            self.cache.set(entry.x, entry.y, hash);
            stats.cells_painted += 1;
            dirty.ack(&entry);
        }
        self.out.flush()?;
        trace!(
            target: "render.raster",
            painted = stats.cells_painted,
            skipped = stats.cells_skipped,
            "pass_complete"
        );
        Ok(stats)
    }
}
