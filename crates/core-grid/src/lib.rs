//! Screen replica: cell grid, redraw command interpreter, dirty tracking.
//!
//! The grid is the single source of truth for "what should be on screen".
//! Only `Screen::apply` mutates it, driven by the decoded redraw command
//! stream; renderers and the dirty tracker read it. Every structural mutation
//! reports the touched coordinates to the `DirtyTracker` in the same call;
//! there is no deferred dirtying, so a render tick between any two commands
//! always sees a consistent (grid, dirty-set) pair.
//!
//! Core invariants:
//! * Grid dimensions change only through `Resize`, which reallocates and
//!   resets every cell; a partially resized grid is never observable.
//! * A pending scroll region is consumed by exactly one scroll command and
//!   never leaks into a later unrelated scroll.
//! * The dirty set is a set: duplicate marks collapse, and absence of a cell
//!   means the renderer's view of it is current.

mod cell;
mod command;
mod dirty;
mod grid;
mod screen;

pub use cell::{Cell, CellFlags, Color};
pub use command::{
    EditorMode, HighlightAttrs, PopupItem, RedrawCommand, decode_batch, decode_entry,
};
pub use dirty::{DirtyCell, DirtyTracker};
pub use grid::{Grid, ScrollRegion};
pub use screen::Screen;
