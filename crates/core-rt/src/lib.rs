//! Pipeline wiring: session, screen replica, sync manager, event surface.
//!
//! [`CorePipeline`] owns everything downstream of the byte stream and runs
//! the notification pump: a single task draining one merged stream of redraw
//! and plugin notifications, so they are processed in wire arrival order
//! relative to each other. Each redraw batch is decoded and applied to the
//! screen *fully* under one lock, so a render tick can never observe a
//! half-applied batch. Mode changes are forwarded to the buffer sync manager
//! synchronously, in batch order, before the next command executes; the
//! incremental/full decision depends on it.
//!
//! Embedding applications drive rendering themselves (typically from a
//! display refresh signal) via [`CorePipeline::render_tick`]; between ticks
//! the dirty tracker coalesces however many batches arrived.

mod logging;

pub use logging::{LogGuard, init_logging, install_panic_hook};

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use core_config::Config;
use core_events::Topic;
use core_grid::{DirtyTracker, EditorMode, RedrawCommand, Screen, decode_batch};
use core_render::{RenderStats, Renderer};
use core_session::{Disconnect, EditorProcess, Session, watch_exit};
use core_sync::{BufferUpdateManager, SyncAction, decode_plugin_notification};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// Notification method carrying redraw command batches.
pub const REDRAW_METHOD: &str = "redraw";
/// Notification method carrying multiplexed application messages.
pub const PLUGIN_METHOD: &str = "tether_event";

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Screen replica plus its dirty bookkeeping; mutated only by the redraw
/// pump, read by render ticks.
pub struct CoreState {
    pub screen: Screen,
    pub dirty: DirtyTracker,
}

pub struct CorePipeline {
    session: Session,
    state: Arc<Mutex<CoreState>>,
    sync: Arc<Mutex<BufferUpdateManager>>,
    mutations: Arc<Topic<RedrawCommand>>,
    modes: Arc<Topic<EditorMode>>,
    attach_errors: Arc<Topic<String>>,
    dims: (u16, u16),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CorePipeline {
    pub fn new(session: Session, config: &Config) -> Self {
        let dims = config
            .file
            .grid
            .fixed_dimensions()
            .unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
        Self {
            session,
            state: Arc::new(Mutex::new(CoreState {
                screen: Screen::new(dims.0, dims.1),
                dirty: DirtyTracker::new(),
            })),
            sync: Arc::new(Mutex::new(BufferUpdateManager::new(
                config.file.sync.max_lines,
            ))),
            mutations: Arc::new(Topic::new("rt.mutation")),
            modes: Arc::new(Topic::new("rt.mode")),
            attach_errors: Arc::new(Topic::new("rt.attach_error")),
            dims,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Raw grid mutations, one per applied command (renderer integrations
    /// that want change notifications rather than polling).
    pub fn subscribe_mutations(&self) -> UnboundedReceiver<RedrawCommand> {
        self.mutations.subscribe()
    }

    pub fn subscribe_modes(&self) -> UnboundedReceiver<EditorMode> {
        self.modes.subscribe()
    }

    pub fn subscribe_attach_errors(&self) -> UnboundedReceiver<String> {
        self.attach_errors.subscribe()
    }

    pub fn subscribe_disconnects(&self) -> UnboundedReceiver<Disconnect> {
        self.session.subscribe_disconnects()
    }

    pub fn subscribe_buffer_updates(&self) -> UnboundedReceiver<core_sync::BufferUpdate> {
        lock(&self.sync).subscribe_updates()
    }

    pub fn subscribe_buffer_updates_incremental(
        &self,
    ) -> UnboundedReceiver<core_sync::BufferUpdateIncremental> {
        lock(&self.sync).subscribe_incremental()
    }

    pub fn subscribe_plugin_events(&self) -> UnboundedReceiver<core_sync::PluginEvent> {
        lock(&self.sync).subscribe_events()
    }

    /// Spawn the editor process and run the full attach pipeline over its
    /// stdio.
    pub fn attach_process(&self, program: &str, args: &[&str]) -> Result<()> {
        let process = EditorProcess::spawn(program, args)?;
        let (stdout, stdin, child) = process.into_parts();
        tokio::spawn(watch_exit(child));
        self.attach_streams(stdout, stdin);
        Ok(())
    }

    /// Wire already-connected stream halves: attach the session, start the
    /// notification pump, and issue the UI attach handshake advertising grid
    /// dimensions.
    pub fn attach_streams<R, W>(&self, reader: R, writer: W)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        // One merged subscription, one pump task: redraw and plugin
        // notifications are processed in wire arrival order relative to each
        // other, which the mode/update coupling in the sync manager relies
        // on. Subscribe before attaching so no notification can slip past
        // the pump while the reader task spins up.
        let notify_rx = self.session.subscribe_methods(&[REDRAW_METHOD, PLUGIN_METHOD]);
        self.session.attach(reader, writer);
        self.spawn_notification_pump(notify_rx);

        let session = self.session.clone();
        let attach_errors = Arc::clone(&self.attach_errors);
        let (cols, rows) = self.dims;
        tokio::spawn(async move {
            if let Err(err) = session.attach_ui(cols, rows).await {
                warn!(target: "rt.attach", %err, "ui_attach_failed");
                attach_errors.publish(err.to_string());
            }
        });
    }

    /// One render pass: repaint dirty cells against the current grid. The
    /// state lock spans the pass, so the renderer sees only fully-applied
    /// batches.
    pub fn render_tick(&self, renderer: &mut dyn Renderer) -> Result<RenderStats> {
        let mut state = lock(&self.state);
        let CoreState { screen, dirty } = &mut *state;
        renderer.render(screen.grid(), dirty)
    }

    /// Read-only access to the replica for tests and chrome queries.
    pub fn with_state<T>(&self, f: impl FnOnce(&CoreState) -> T) -> T {
        f(&lock(&self.state))
    }

    /// One task drains the merged notification stream, so a plugin message
    /// that followed a mode change on the wire is handled after it: the sync
    /// manager's incremental gate always reflects everything earlier on the
    /// wire. A forced resync fetch completes before the next notification is
    /// taken, so post-flush messages see the reconciled replica.
    fn spawn_notification_pump(
        &self,
        mut notifications: UnboundedReceiver<(String, Vec<core_wire::Value>)>,
    ) {
        let state = Arc::clone(&self.state);
        let sync = Arc::clone(&self.sync);
        let session = self.session.clone();
        let mutations = Arc::clone(&self.mutations);
        let modes = Arc::clone(&self.modes);
        tokio::spawn(async move {
            while let Some((method, args)) = notifications.recv().await {
                let mut resync = false;
                match method.as_str() {
                    REDRAW_METHOD => {
                        let batch = decode_batch(&args);
                        let mut state = lock(&state);
                        let CoreState { screen, dirty } = &mut *state;
                        for command in batch {
                            screen.apply(&command, dirty);
                            if let RedrawCommand::ModeChange { mode } = &command {
                                // Synchronous, in batch order: the sync
                                // manager's incremental gate must see the
                                // mode before any later command.
                                if lock(&sync).handle_mode_change(mode) == SyncAction::FullResync {
                                    resync = true;
                                }
                                modes.publish(mode.clone());
                            }
                            mutations.publish(command);
                        }
                    }
                    PLUGIN_METHOD => {
                        if let Some(message) = decode_plugin_notification(&args) {
                            resync = lock(&sync).handle_plugin(message) == SyncAction::FullResync;
                        }
                    }
                    other => {
                        debug!(target: "rt.pump", method = other, "unexpected_method");
                    }
                }
                if resync {
                    run_resync(&session, &sync).await;
                }
            }
            debug!(target: "rt.pump", "notification_pump_ended");
        });
    }
}

async fn run_resync(session: &Session, sync: &Arc<Mutex<BufferUpdateManager>>) {
    match session.current_buffer_lines().await {
        Ok(lines) => lock(sync).apply_resync(lines),
        Err(err) => {
            // The session closing mid-resync surfaces through the
            // disconnect topic; everything else is just logged.
            warn!(target: "rt.pump", %err, "forced_resync_fetch_failed");
        }
    }
}
