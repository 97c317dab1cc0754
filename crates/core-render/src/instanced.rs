//! Batched strategy: per-frame instance buffers for a GPU text pipeline.
//!
//! Each pass produces a `FrameBatch`: one background quad per repainted
//! cell, plus a glyph instance for cells with visible foreground content.
//! Uploading the buffers and issuing draws belongs to the embedding
//! application; this crate only decides *what* needs repainting.

use crate::cache::{LastDrawnCache, painted_cell_hash};
use crate::{RenderStats, Renderer};
use anyhow::Result;
use core_grid::{Color, DirtyTracker, Grid};
use tracing::trace;

/// Solid background rectangle covering one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadInstance {
    pub x: u16,
    pub y: u16,
    pub bg: Color,
}

/// One shaped glyph cluster positioned at a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphInstance {
    pub x: u16,
    pub y: u16,
    pub glyph: String,
    pub fg: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub undercurl: bool,
}

/// Instance buffers for one frame. Row-major ordering within each buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameBatch {
    pub quads: Vec<QuadInstance>,
    pub glyphs: Vec<GlyphInstance>,
}

impl FrameBatch {
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty() && self.glyphs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct InstanceRenderer {
    cache: LastDrawnCache,
    batch: FrameBatch,
}

impl InstanceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The batch produced by the most recent `render` pass.
    pub fn batch(&self) -> &FrameBatch {
        &self.batch
    }

    /// Move the most recent batch out, leaving an empty one behind.
    pub fn take_batch(&mut self) -> FrameBatch {
        std::mem::take(&mut self.batch)
    }
}

impl Renderer for InstanceRenderer {
    fn render(&mut self, grid: &Grid, dirty: &mut DirtyTracker) -> Result<RenderStats> {
        if self.cache.ensure_dims(grid) {
            trace!(target: "render.instanced", cols = grid.cols(), rows = grid.rows(), "cache_reset");
        }
        self.batch = FrameBatch::default();
        let mut snap = dirty.snapshot();
        snap.sort_unstable_by_key(|c| (c.y, c.x));

        let mut stats = RenderStats::default();
        for entry in snap {
            if !grid.in_bounds(entry.x, entry.y) {
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
            // REVERSE swaps effective colors before instancing so the
            // pipeline never needs a per-cell branch.
            let mut fg = cell.fg.unwrap_or(grid.default_fg);
            let mut bg = cell.bg.unwrap_or(grid.default_bg);
            if cell.flags.contains(core_grid::CellFlags::REVERSE) {
                std::mem::swap(&mut fg, &mut bg);
            }
            self.batch.quads.push(QuadInstance {
                x: entry.x,
                y: entry.y,
                bg,
            });
            if cell.has_foreground_glyph() {
                self.batch.glyphs.push(GlyphInstance {
                    x: entry.x,
                    y: entry.y,
                    glyph: cell.glyph.clone(),
                    fg,
                    bold: cell.flags.contains(core_grid::CellFlags::BOLD),
                    italic: cell.flags.contains(core_grid::CellFlags::ITALIC),
                    underline: cell.flags.contains(core_grid::CellFlags::UNDERLINE),
                    undercurl: cell.flags.contains(core_grid::CellFlags::UNDERCURL),
                });
            }
            self.cache.set(entry.x, entry.y, hash);
            stats.cells_painted += 1;
            dirty.ack(&entry);
        }
        trace!(
            target: "render.instanced",
            quads = self.batch.quads.len(),
            glyphs = self.batch.glyphs.len(),
            skipped = stats.cells_skipped,
            "pass_complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_grid::{DirtyTracker, RedrawCommand, Screen};

    #[test]
    fn quads_for_every_painted_cell_glyphs_only_for_visible_content() {
        let mut screen = Screen::new(8, 2);
        let mut dirty = DirtyTracker::new();
        screen.apply(
            &RedrawCommand::Put {
                glyphs: vec!["o".into(), " ".into(), "k".into()],
            },
            &mut dirty,
        );
        let mut renderer = InstanceRenderer::new();
        let stats = renderer.render(screen.grid(), &mut dirty).expect("render");
        assert_eq!(stats.cells_painted, 3);
        let batch = renderer.batch();
        assert_eq!(batch.quads.len(), 3);
        assert_eq!(batch.glyphs.len(), 2, "the space cell gets no glyph");
        assert_eq!(batch.glyphs[0].glyph, "o");
        assert_eq!(batch.glyphs[1].glyph, "k");
        assert!(dirty.is_empty());
    }

    #[test]
    fn second_pass_with_no_mutations_is_empty() {
        let mut screen = Screen::new(4, 1);
        let mut dirty = DirtyTracker::new();
        screen.apply(
            &RedrawCommand::Put {
                glyphs: vec!["x".into()],
            },
            &mut dirty,
        );
        let mut renderer = InstanceRenderer::new();
        renderer.render(screen.grid(), &mut dirty).expect("render");
        let stats = renderer.render(screen.grid(), &mut dirty).expect("render");
        assert_eq!(stats, RenderStats::default());
        assert!(renderer.batch().is_empty());
    }

    #[test]
    fn resize_forces_full_repaint() {
        let mut screen = Screen::new(10, 2);
        let mut dirty = DirtyTracker::new();
        screen.apply(&RedrawCommand::Resize { cols: 10, rows: 2 }, &mut dirty);
        let mut renderer = InstanceRenderer::new();
        renderer.render(screen.grid(), &mut dirty).expect("render");

        screen.apply(&RedrawCommand::Resize { cols: 5, rows: 4 }, &mut dirty);
        let stats = renderer.render(screen.grid(), &mut dirty).expect("render");
        assert_eq!(stats.cells_painted, 20);
        assert_eq!(stats.cells_skipped, 0);
    }

    #[test]
    fn stale_marks_outside_shrunk_grid_are_acked_without_instances() {
        let mut screen = Screen::new(4, 4);
        let mut dirty = DirtyTracker::new();
        dirty.mark(3, 3);
        screen.apply(&RedrawCommand::Resize { cols: 2, rows: 2 }, &mut dirty);
        // Resize marks (0,0)..(1,1); the (3,3) mark survives in the tracker.
        dirty.mark(3, 3);
        let mut renderer = InstanceRenderer::new();
        let stats = renderer.render(screen.grid(), &mut dirty).expect("render");
        assert_eq!(stats.cells_painted, 4);
        assert!(dirty.is_empty(), "out-of-bounds marks are still drained");
    }

    #[test]
    fn empty_and_space_produce_identical_batches() {
        let empty_screen = Screen::new(1, 1);
        let mut space_screen = Screen::new(1, 1);
        let mut dirty_a = DirtyTracker::new();
        let mut dirty_b = DirtyTracker::new();
        dirty_a.mark(0, 0);
        space_screen.apply(
            &RedrawCommand::Put {
                glyphs: vec![" ".into()],
            },
            &mut dirty_b,
        );
        let mut ra = InstanceRenderer::new();
        let mut rb = InstanceRenderer::new();
        ra.render(empty_screen.grid(), &mut dirty_a).expect("render");
        rb.render(space_screen.grid(), &mut dirty_b).expect("render");
        assert_eq!(ra.batch(), rb.batch());
    }

    #[test]
    fn reverse_flag_swaps_quad_and_glyph_colors() {
        use core_grid::{CellFlags, Color, HighlightAttrs};
        let mut screen = Screen::new(2, 1);
        let mut dirty = DirtyTracker::new();
        screen.apply(
            &RedrawCommand::HighlightSet {
                attrs: HighlightAttrs {
                    fg: Some(Color(0x111111)),
                    bg: Some(Color(0x222222)),
                    flags: CellFlags::REVERSE,
                },
            },
            &mut dirty,
        );
        screen.apply(
            &RedrawCommand::Put {
                glyphs: vec!["r".into()],
            },
            &mut dirty,
        );
        let mut renderer = InstanceRenderer::new();
        renderer.render(screen.grid(), &mut dirty).expect("render");
        assert_eq!(renderer.batch().quads[0].bg, Color(0x111111));
        assert_eq!(renderer.batch().glyphs[0].fg, Color(0x222222));
    }
}
