//! Incremental renderers over the screen replica.
//!
//! Two interchangeable strategies behind one contract:
//!
//! * `RasterRenderer` - immediate mode: emits terminal cursor/color/text
//!   commands per dirty cell through any `io::Write`.
//! * `InstanceRenderer` - batched: builds background-quad and glyph-instance
//!   buffers for a GPU text pipeline; upload and draw belong to the embedding
//!   application.
//!
//! Contract (both strategies):
//! * Repaint only dirty cells. A full-grid repaint outside resize is a
//!   correctness bug, not a tuning choice.
//! * Acknowledge exactly the cells painted or verified, via the tracker's
//!   versioned ack, so a mutation racing the render pass is never lost.
//! * Empty-string and single-space glyphs are identical background-only
//!   output. Consumers rely on renderer-agnostic pixels; the equivalence is
//!   pinned by tests for both strategies.
//! * The last-drawn cache resets whenever grid dimensions change, so a stale
//!   comparison from the old geometry can never suppress a needed repaint.

mod cache;
mod instanced;
mod raster;

pub use cache::LastDrawnCache;
pub use instanced::{FrameBatch, GlyphInstance, InstanceRenderer, QuadInstance};
pub use raster::RasterRenderer;

use anyhow::Result;
use core_grid::{DirtyTracker, Grid};

/// Per-pass accounting, used for idempotence assertions and telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Cells actually emitted this pass.
    pub cells_painted: usize,
    /// Dirty cells verified unchanged against the last-drawn cache.
    pub cells_skipped: usize,
}

/// One render strategy. `render` pulls the dirty snapshot, repaints against
/// the grid, and acknowledges what it handled.
pub trait Renderer {
    fn render(&mut self, grid: &Grid, dirty: &mut DirtyTracker) -> Result<RenderStats>;
}
