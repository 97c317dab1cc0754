//! The redraw interpreter: applies decoded commands to the grid.
//!
//! Mutation rules (the interpreter contract):
//! * `put` writes at the current cursor, advancing the cursor column per
//!   glyph. It never wraps; the editor drives wrapping with an explicit
//!   cursor-goto.
//! * `highlight_set` changes the attribute state tagged onto subsequent puts
//!   only; it is never retroactive.
//! * `scroll` consumes the pending scroll region (whole grid when none is
//!   set). Destination rows are exactly `top..=bottom`, columns
//!   `left..=right`; each destination row copies from `row + count`, read
//!   from the grid even when the source lies outside the region, and rows
//!   whose source falls off the grid are blanked with the current default
//!   background. Cells outside the region are read at most, never written.
//! * `resize` reallocates the grid and marks the entire new grid dirty; no
//!   stale content survives.
//! * `mode_change` is applied synchronously in batch order so buffer
//!   synchronization observes it correctly relative to surrounding puts.
//!
//! Every write lands in the dirty tracker within the same `apply` call.

use crate::cell::Cell;
use crate::command::{EditorMode, HighlightAttrs, RedrawCommand};
use crate::dirty::DirtyTracker;
use crate::grid::{Grid, ScrollRegion};
use tracing::{debug, trace, warn};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

#[derive(Debug)]
pub struct Screen {
    grid: Grid,
    attrs: HighlightAttrs,
    pending_scroll: Option<ScrollRegion>,
    mode: EditorMode,
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            grid: Grid::new(cols, rows),
            attrs: HighlightAttrs::default(),
            pending_scroll: None,
            mode: EditorMode::Normal,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    /// Apply one command, reporting every touched coordinate to `dirty`.
    pub fn apply(&mut self, cmd: &RedrawCommand, dirty: &mut DirtyTracker) {
        match cmd {
            RedrawCommand::CursorGoto { row, col } => {
                self.grid.cursor_row = *row;
                self.grid.cursor_col = *col;
            }
            RedrawCommand::Put { glyphs } => self.put(glyphs, dirty),
            RedrawCommand::SetScrollRegion { top, bottom, left, right } => {
                self.pending_scroll = Some(ScrollRegion {
                    top: *top,
                    bottom: *bottom,
                    left: *left,
                    right: *right,
                });
            }
            RedrawCommand::Scroll { count } => self.scroll(*count, dirty),
            RedrawCommand::HighlightSet { attrs } => self.attrs = *attrs,
            RedrawCommand::Resize { cols, rows } => {
                debug!(target: "redraw.apply", cols, rows, "grid_resize");
                self.grid.resize(*cols, *rows);
                self.pending_scroll = None;
                dirty.mark_all(*cols, *rows);
            }
            RedrawCommand::EolClear => self.eol_clear(dirty),
            RedrawCommand::Clear => {
                self.grid.clear();
                dirty.mark_all(self.grid.cols(), self.grid.rows());
            }
            RedrawCommand::UpdateBg { color } => {
                self.grid.default_bg = *color;
                // Default-colored cells change appearance everywhere.
                dirty.mark_all(self.grid.cols(), self.grid.rows());
            }
            RedrawCommand::UpdateFg { color } => {
                self.grid.default_fg = *color;
                dirty.mark_all(self.grid.cols(), self.grid.rows());
            }
            RedrawCommand::ModeChange { mode } => {
                trace!(target: "redraw.apply", ?mode, "mode_change");
                self.mode = mode.clone();
            }
            RedrawCommand::PopupMenuShow { .. } => {
                // Chrome-level surface; no grid content changes here.
            }
            RedrawCommand::Unknown { name } => {
                warn!(target: "redraw.apply", command = name.as_str(), "unknown_command_skipped");
            }
        }
    }

    fn put(&mut self, glyphs: &[String], dirty: &mut DirtyTracker) {
        let row = self.grid.cursor_row;
        for raw in glyphs {
            // A wire glyph is usually one cluster, but defensively split so a
            // multi-cluster payload still lands one cluster per cell.
            for cluster in raw.graphemes(true) {
                self.put_cluster(cluster, row, dirty);
            }
            if raw.is_empty() {
                self.put_cluster("", row, dirty);
            }
        }
    }

    fn put_cluster(&mut self, cluster: &str, row: u16, dirty: &mut DirtyTracker) {
        let col = self.grid.cursor_col;
        if !self.grid.in_bounds(col, row) {
            trace!(target: "redraw.apply", row, col, "put_outside_grid");
            return;
        }
        let cell = self.grid.cell_mut(col, row);
        cell.glyph = cluster.to_string();
        cell.fg = self.attrs.fg;
        cell.bg = self.attrs.bg;
        cell.flags = self.attrs.flags;
        dirty.mark(col, row);
        self.grid.cursor_col = col + 1;

        // A double-width cluster owns the following cell as an empty spacer.
        if cluster.width() > 1 && self.grid.in_bounds(col + 1, row) {
            let spacer = self.grid.cell_mut(col + 1, row);
            *spacer = Cell {
                glyph: String::new(),
                fg: self.attrs.fg,
                bg: self.attrs.bg,
                flags: self.attrs.flags,
            };
            dirty.mark(col + 1, row);
            self.grid.cursor_col = col + 2;
        }
    }

    fn scroll(&mut self, count: i64, dirty: &mut DirtyTracker) {
        // Consume the pending region regardless of whether the scroll is a
        // no-op, so it cannot leak into a later scroll.
        let pending = self.pending_scroll.take();
        if count == 0 {
            return;
        }
        let Some(region) = pending
            .and_then(|r| self.grid.clamp_region(r))
            .or_else(|| self.grid.full_region())
        else {
            return;
        };

        let rows: Vec<u16> = if count > 0 {
            (region.top..=region.bottom).collect()
        } else {
            (region.top..=region.bottom).rev().collect()
        };
        for dest_row in rows {
            let src = i64::from(dest_row) + count;
            for col in region.left..=region.right {
                let cell = if src >= 0 && src < i64::from(self.grid.rows()) {
                    self.grid.cell(col, src as u16).clone()
                } else {
                    // Trailing edge ran off the grid: reveal blank cells with
                    // the current background.
                    Cell {
                        bg: Some(self.grid.default_bg),
                        ..Cell::default()
                    }
                };
                *self.grid.cell_mut(col, dest_row) = cell;
                dirty.mark(col, dest_row);
            }
        }
    }

    fn eol_clear(&mut self, dirty: &mut DirtyTracker) {
        let row = self.grid.cursor_row;
        if row >= self.grid.rows() {
            return;
        }
        for col in self.grid.cursor_col..self.grid.cols() {
            *self.grid.cell_mut(col, row) = Cell {
                bg: self.attrs.bg,
                ..Cell::default()
            };
            dirty.mark(col, row);
        }
    }
}
