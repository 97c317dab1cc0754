//! Cell-granular dirty tracking with versioned acknowledgement.
//!
//! A cell present in the set means "grid content at (x, y) may differ from
//! what was last drawn"; absence means the renderer's view is guaranteed
//! current. Duplicate marks collapse (set, not log), which is also the
//! backpressure story: redraw bursts between render ticks coalesce instead
//! of queueing.
//!
//! Acknowledgement is content-versioned, not blind. `snapshot` captures each
//! cell's mark version; `ack` removes the entry only if the cell has not been
//! re-marked since the snapshot was taken. A mutation landing between
//! snapshot and ack therefore survives to the next render pass.

use std::collections::HashMap;

/// One dirty coordinate plus the mark version captured at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyCell {
    pub x: u16,
    pub y: u16,
    version: u64,
}

#[derive(Debug, Default)]
pub struct DirtyTracker {
    cells: HashMap<(u16, u16), u64>,
    clock: u64,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a cell stale. Re-marking bumps the version so in-flight
    /// snapshots cannot acknowledge the newer mutation away.
    pub fn mark(&mut self, x: u16, y: u16) {
        self.clock += 1;
        self.cells.insert((x, y), self.clock);
    }

    /// Mark every cell of a `cols` x `rows` grid (resize / full clear).
    pub fn mark_all(&mut self, cols: u16, rows: u16) {
        for y in 0..rows {
            for x in 0..cols {
                self.mark(x, y);
            }
        }
    }

    /// Point-in-time view of the dirty set. Order is unspecified; each
    /// pending coordinate appears exactly once.
    pub fn snapshot(&self) -> Vec<DirtyCell> {
        self.cells
            .iter()
            .map(|(&(x, y), &version)| DirtyCell { x, y, version })
            .collect()
    }

    /// Acknowledge one rendered cell. Returns false (and keeps the entry)
    /// when the cell was re-marked after the snapshot.
    pub fn ack(&mut self, cell: &DirtyCell) -> bool {
        match self.cells.get(&(cell.x, cell.y)) {
            Some(&version) if version == cell.version => {
                self.cells.remove(&(cell.x, cell.y));
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        self.cells.contains_key(&(x, y))
    }

    /// Drop all pending marks without acknowledgement (session teardown).
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
