//! Buffer content synchronization.
//!
//! Keeps a local text replica of the focused buffer current while it is being
//! edited keystroke-by-keystroke, choosing between full-content events and
//! single-line incremental patches. The ruling constraint is never diverging
//! from truth: incremental patches are only trusted while insert-mode edits
//! stay on one line with no structural line-count change, and any drift
//! signal (version regression aside: those are silently dropped as expected
//! races) collapses back to a full resync.
//!
//! The manager is synchronous and side-effect free apart from event
//! publication; when it needs fresh buffer content it returns
//! [`SyncAction::FullResync`] and the owning pipeline performs the fetch,
//! feeding the result back through [`BufferUpdateManager::apply_full`].

mod demux;

pub use demux::{PluginMessage, decode_plugin_notification};

use std::collections::HashMap;

use core_events::Topic;
use core_grid::EditorMode;
use core_wire::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace, warn};

/// Full-context snapshot header for one buffer update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferContext {
    pub file_path: String,
    pub total_lines: usize,
    pub version: u64,
    /// Zero-based line the edit landed on.
    pub current_line: usize,
}

/// The local replica of one buffer; superseded wholesale by each accepted
/// full update, mutated one line at a time by incremental patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub context: BufferContext,
    pub lines: Vec<String>,
}

/// Full-content change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferUpdate {
    pub context: BufferContext,
    pub lines: Vec<String>,
}

/// Single-line change event, emitted instead of full content during rapid
/// same-line edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferUpdateIncremental {
    pub context: BufferContext,
    pub line_number: usize,
    pub line: String,
}

/// Generic application event relayed from the plugin notification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginEvent {
    pub name: String,
    pub args: Vec<Value>,
}

/// What the owning pipeline must do after feeding the manager an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a FullResync action must be carried out or state drifts"]
pub enum SyncAction {
    None,
    /// Fetch the full buffer content and feed it to `apply_full`.
    FullResync,
}

pub struct BufferUpdateManager {
    can_send_incremental: bool,
    in_insert: bool,
    last_context: Option<BufferContext>,
    snapshots: HashMap<String, BufferSnapshot>,
    max_lines: usize,
    updates: Topic<BufferUpdate>,
    incremental: Topic<BufferUpdateIncremental>,
    events: Topic<PluginEvent>,
}

impl BufferUpdateManager {
    pub fn new(max_lines: usize) -> Self {
        Self {
            can_send_incremental: false,
            in_insert: false,
            last_context: None,
            snapshots: HashMap::new(),
            max_lines,
            updates: Topic::new("sync.buffer_update"),
            incremental: Topic::new("sync.buffer_update_incremental"),
            events: Topic::new("sync.plugin_event"),
        }
    }

    pub fn subscribe_updates(&self) -> UnboundedReceiver<BufferUpdate> {
        self.updates.subscribe()
    }

    pub fn subscribe_incremental(&self) -> UnboundedReceiver<BufferUpdateIncremental> {
        self.incremental.subscribe()
    }

    pub fn subscribe_events(&self) -> UnboundedReceiver<PluginEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self, path: &str) -> Option<&BufferSnapshot> {
        self.snapshots.get(path)
    }

    /// Mode transitions gate the incremental fast path. Entering insert mode
    /// arms it; leaving insert mode while it was armed forces one full flush
    /// so drift accumulated by single-line patches is reconciled before
    /// consumers trust the state again.
    pub fn handle_mode_change(&mut self, mode: &EditorMode) -> SyncAction {
        let entering = mode.is_insert();
        let leaving = self.in_insert && !entering;
        self.in_insert = entering;
        if entering {
            self.can_send_incremental = true;
            trace!(target: "sync.mode", "incremental_armed");
            return SyncAction::None;
        }
        if leaving && self.can_send_incremental {
            self.can_send_incremental = false;
            debug!(target: "sync.mode", "leave_insert_forcing_flush");
            return SyncAction::FullResync;
        }
        SyncAction::None
    }

    /// One buffer-update event carrying the full line array. Decides between
    /// an incremental single-line patch event and a full-content event.
    pub fn handle_update(&mut self, context: BufferContext, lines: Vec<String>) -> SyncAction {
        if context.total_lines > self.max_lines {
            trace!(
                target: "sync.update",
                path = context.file_path.as_str(),
                total_lines = context.total_lines,
                ceiling = self.max_lines,
                "update_suppressed_over_ceiling"
            );
            return SyncAction::None;
        }
        if self.is_stale(&context) {
            trace!(
                target: "sync.update",
                path = context.file_path.as_str(),
                version = context.version,
                "stale_version_dropped"
            );
            return SyncAction::None;
        }

        let same_line_edit = self.can_send_incremental
            && self.last_context.as_ref().is_some_and(|last| {
                last.file_path == context.file_path
                    && last.current_line == context.current_line
                    && last.total_lines == context.total_lines
            });
        if same_line_edit {
            let Some(line) = lines.get(context.current_line).cloned() else {
                warn!(
                    target: "sync.update",
                    path = context.file_path.as_str(),
                    line = context.current_line,
                    "edited_line_outside_payload_forcing_resync"
                );
                return SyncAction::FullResync;
            };
            self.patch_snapshot(&context, &line);
            self.last_context = Some(context.clone());
            self.incremental.publish(BufferUpdateIncremental {
                line_number: context.current_line,
                line,
                context,
            });
            return SyncAction::None;
        }

        self.accept_full(context, lines);
        SyncAction::None
    }

    /// One incremental patch from the wire: mutate a single line of the
    /// replica. A line number outside the known line count means our state
    /// has drifted; patching out of bounds would bake the drift in, so force
    /// a full resync instead.
    pub fn handle_incremental(
        &mut self,
        context: BufferContext,
        line_number: usize,
        line: String,
    ) -> SyncAction {
        if context.total_lines > self.max_lines {
            return SyncAction::None;
        }
        if self.is_stale(&context) {
            return SyncAction::None;
        }
        let known_lines = self
            .snapshots
            .get(&context.file_path)
            .map(|snapshot| snapshot.lines.len());
        match known_lines {
            Some(count) if line_number < count => {
                if let Some(snapshot) = self.snapshots.get_mut(&context.file_path) {
                    snapshot.lines[line_number] = line.clone();
                    snapshot.context = context.clone();
                }
                self.last_context = Some(context.clone());
                self.incremental.publish(BufferUpdateIncremental {
                    context,
                    line_number,
                    line,
                });
                SyncAction::None
            }
            _ => {
                debug!(
                    target: "sync.update",
                    path = context.file_path.as_str(),
                    line = line_number,
                    known = ?known_lines,
                    "incremental_out_of_bounds_forcing_resync"
                );
                SyncAction::FullResync
            }
        }
    }

    /// Full content fetched by the pipeline (a forced resync landing).
    /// Always supersedes tracked state.
    pub fn apply_full(&mut self, context: BufferContext, lines: Vec<String>) {
        if self.is_stale(&context) {
            trace!(
                target: "sync.update",
                path = context.file_path.as_str(),
                version = context.version,
                "resync_result_stale_dropped"
            );
            return;
        }
        self.accept_full(context, lines);
    }

    /// A forced-resync fetch landed without a fresh context from the wire.
    /// The fetched content supersedes the replica, but the staleness floor
    /// stays at the last wire version: the editor owns the version space, so
    /// inventing one here could collide with its next genuine update. Any
    /// pre-flush straggler already carries a version at or below the floor
    /// and drops as stale; the next real update carries a greater one.
    pub fn apply_resync(&mut self, lines: Vec<String>) {
        let Some(last) = &self.last_context else {
            trace!(target: "sync.update", "resync_without_context_dropped");
            return;
        };
        let context = BufferContext {
            file_path: last.file_path.clone(),
            total_lines: lines.len(),
            version: last.version,
            current_line: last.current_line.min(lines.len().saturating_sub(1)),
        };
        self.accept_full(context, lines);
    }

    /// Route one decoded plugin message.
    pub fn handle_plugin(&mut self, message: PluginMessage) -> SyncAction {
        match message {
            PluginMessage::BufferUpdate { context, lines } => self.handle_update(context, lines),
            PluginMessage::BufferUpdateIncremental {
                context,
                line_number,
                line,
            } => self.handle_incremental(context, line_number, line),
            PluginMessage::Event { name, args } => {
                self.events.publish(PluginEvent { name, args });
                SyncAction::None
            }
        }
    }

    fn is_stale(&self, context: &BufferContext) -> bool {
        self.snapshots
            .get(&context.file_path)
            .is_some_and(|snapshot| context.version <= snapshot.context.version)
    }

    fn accept_full(&mut self, context: BufferContext, lines: Vec<String>) {
        self.snapshots.insert(
            context.file_path.clone(),
            BufferSnapshot {
                context: context.clone(),
                lines: lines.clone(),
            },
        );
        self.last_context = Some(context.clone());
        self.updates.publish(BufferUpdate { context, lines });
    }

    fn patch_snapshot(&mut self, context: &BufferContext, line: &str) {
        if let Some(snapshot) = self.snapshots.get_mut(&context.file_path) {
            if let Some(slot) = snapshot.lines.get_mut(context.current_line) {
                *slot = line.to_string();
            }
            snapshot.context = context.clone();
        }
    }
}
