//! RPC session over one duplex byte stream.
//!
//! The session owns the framing and correlation state machine for the editor
//! process: it assigns request ids, parks each caller on a pending-call entry
//! until the matching response arrives, and fans unsolicited notifications out
//! to per-method subscribers in wire arrival order.
//!
//! State machine: `Connecting -> Attached -> Closed`.
//!
//! * `Connecting` - outbound frames queue; nothing is written yet.
//! * `Attached` - `attach` flushed the queue in submission order and spawned
//!   the reader/writer tasks; requests flow normally.
//! * `Closed` - stream EOF or a fatal write error; every pending call rejects
//!   with [`SessionError::Closed`] and later calls reject without touching the
//!   stream.
//!
//! Ordering: requests hit the wire in call order (the writer task drains one
//! FIFO); responses correlate by id and may arrive in any order; notifications
//! and responses are handled strictly in the order they were read. A malformed
//! frame is logged and skipped; the decoder resynchronizes on the following
//! bytes rather than killing an otherwise healthy session.

mod api;
mod transport;

pub use transport::{EditorProcess, watch_exit};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use core_events::Topic;
use core_wire::{FrameDecoder, Message, Value};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Responses whose id matched no pending call.
pub static UNKNOWN_RESPONSES: AtomicU64 = AtomicU64::new(0);
/// Frames the reader skipped after a decode failure.
pub static MALFORMED_FRAMES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session closed")]
    Closed,
    #[error("peer error: {0:?}")]
    Remote(Value),
    #[error("unexpected response shape: {0}")]
    BadResponse(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Attached,
    Closed,
}

/// Why the session left `Attached`. Published on the disconnect topic so the
/// owning application can decide user-visible behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    Eof,
    Io(String),
}

enum Outbox {
    /// Pre-attach: frames wait here in submission order.
    Queued(Vec<Vec<u8>>),
    Open(mpsc::UnboundedSender<Vec<u8>>),
    Closed,
}

type PendingCall = oneshot::Sender<Result<Value, SessionError>>;

struct Shared {
    state: Mutex<SessionState>,
    outbox: Mutex<Outbox>,
    next_id: AtomicU32,
    pending: Mutex<HashMap<u32, PendingCall>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<Value>>>>>,
    /// Merged subscriptions: one sender registered under several method
    /// names, delivering tagged payloads over a single channel.
    merged: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<(String, Vec<Value>)>>>>,
    disconnects: Topic<Disconnect>,
}

#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Connecting),
                outbox: Mutex::new(Outbox::Queued(Vec::new())),
                next_id: AtomicU32::new(0),
                pending: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
                merged: Mutex::new(HashMap::new()),
                disconnects: Topic::new("session.disconnect"),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    /// Receives every [`Disconnect`] the session publishes (at most one per
    /// session lifetime).
    pub fn subscribe_disconnects(&self) -> mpsc::UnboundedReceiver<Disconnect> {
        self.shared.disconnects.subscribe()
    }

    /// Subscribe to notifications for one method name. Multiple subscribers
    /// per method fan out; delivery order is wire arrival order.
    pub fn subscribe_notifications(&self, method: &str) -> mpsc::UnboundedReceiver<Vec<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared.subscribers)
            .entry(method.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Subscribe to several methods over one channel, payloads tagged with
    /// their method name. A consumer that must observe cross-method wire
    /// arrival order needs this: separate per-method receivers drained by
    /// separate tasks carry no ordering relative to each other.
    pub fn subscribe_methods(&self, methods: &[&str]) -> mpsc::UnboundedReceiver<(String, Vec<Value>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut merged = lock(&self.shared.merged);
        for method in methods {
            merged
                .entry((*method).to_string())
                .or_default()
                .push(tx.clone());
        }
        rx
    }

    /// Send a request and await its response. Resolves with the peer's result
    /// payload, or rejects when the peer reports an error or the session
    /// closes first. No built-in timeout: callers race with a timer if they
    /// need one.
    pub async fn request(&self, method: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        lock(&self.shared.pending).insert(id, tx);

        let mut frame = Vec::new();
        Message::Request {
            id,
            method: method.to_string(),
            args,
        }
        .encode(&mut frame);
        if let Err(err) = self.send_frame(frame) {
            lock(&self.shared.pending).remove(&id);
            return Err(err);
        }
        trace!(target: "session", id, method, "request_sent");
        // Sender dropped without a value means the session closed underneath.
        rx.await.unwrap_or(Err(SessionError::Closed))
    }

    /// Fire-and-forget: no id, no pending call, no response.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<(), SessionError> {
        let mut frame = Vec::new();
        Message::Notification {
            method: method.to_string(),
            args,
        }
        .encode(&mut frame);
        self.send_frame(frame)
    }

    /// Wire the session to already-connected stream halves and start the
    /// reader/writer tasks. Frames queued while `Connecting` flush first, in
    /// submission order.
    pub fn attach<R, W>(&self, reader: R, writer: W)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        {
            let mut state = lock(&self.shared.state);
            if *state != SessionState::Connecting {
                warn!(target: "session", state = ?*state, "attach_ignored");
                return;
            }
            *state = SessionState::Attached;
        }

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        {
            let mut outbox = lock(&self.shared.outbox);
            if let Outbox::Queued(queued) = std::mem::replace(&mut *outbox, Outbox::Open(frame_tx.clone()))
            {
                debug!(target: "session", frames = queued.len(), "flushing_preattach_queue");
                for frame in queued {
                    // Receiver was created above; send cannot fail here.
                    let _ = frame_tx.send(frame);
                }
            }
        }

        self.spawn_writer(writer, frame_rx);
        self.spawn_reader(reader);
    }

    fn spawn_writer<W>(&self, mut writer: W, mut frames: mpsc::UnboundedReceiver<Vec<u8>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let write = async {
                    writer.write_all(&frame).await?;
                    writer.flush().await
                };
                if let Err(err) = write.await {
                    warn!(target: "session.writer", %err, "write_failed");
                    session.close(Disconnect::Io(err.to_string()));
                    return;
                }
            }
            trace!(target: "session.writer", "outbox_closed");
        });
    }

    fn spawn_reader<R>(&self, mut reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let session = self.clone();
        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut buf = vec![0u8; 16 * 1024];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        debug!(target: "session.reader", "stream_eof");
                        session.close(Disconnect::Eof);
                        return;
                    }
                    Ok(n) => {
                        decoder.extend(&buf[..n]);
                        loop {
                            match decoder.next_frame() {
                                Ok(Some(message)) => session.handle_message(message),
                                Ok(None) => break,
                                Err(err) => {
                                    MALFORMED_FRAMES.fetch_add(1, Ordering::Relaxed);
                                    warn!(target: "session.reader", %err, "malformed_frame_skipped");
                                }
                            }
                        }
                    }
                    Err(err) => {
                        warn!(target: "session.reader", %err, "read_failed");
                        session.close(Disconnect::Io(err.to_string()));
                        return;
                    }
                }
            }
        });
    }

    fn handle_message(&self, message: Message) {
        match message {
            Message::Response { id, result } => {
                let Some(caller) = lock(&self.shared.pending).remove(&id) else {
                    UNKNOWN_RESPONSES.fetch_add(1, Ordering::Relaxed);
                    warn!(target: "session.reader", id, "response_for_unknown_id");
                    return;
                };
                let outcome = result.map_err(SessionError::Remote);
                // Caller gave up (dropped the future); nothing to resolve.
                let _ = caller.send(outcome);
            }
            Message::Notification { method, args } => {
                let mut delivered = false;
                {
                    let mut merged = lock(&self.shared.merged);
                    if let Some(list) = merged.get_mut(&method) {
                        list.retain(|tx| tx.send((method.clone(), args.clone())).is_ok());
                        delivered |= !list.is_empty();
                    }
                }
                let mut subscribers = lock(&self.shared.subscribers);
                if let Some(list) = subscribers.get_mut(&method) {
                    list.retain(|tx| tx.send(args.clone()).is_ok());
                    delivered |= !list.is_empty();
                }
                if !delivered {
                    trace!(target: "session.reader", method, "notification_unsubscribed");
                }
            }
            Message::Request { id, method, .. } => {
                // The editor process never calls back into us; tolerate it.
                warn!(target: "session.reader", id, method, "peer_request_ignored");
            }
        }
    }

    fn send_frame(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        match &mut *lock(&self.shared.outbox) {
            Outbox::Queued(queued) => {
                queued.push(frame);
                Ok(())
            }
            Outbox::Open(tx) => tx.send(frame).map_err(|_| SessionError::Closed),
            Outbox::Closed => Err(SessionError::Closed),
        }
    }

    fn close(&self, reason: Disconnect) {
        {
            let mut state = lock(&self.shared.state);
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }
        // Dropping the sender ends the writer task once its queue drains.
        *lock(&self.shared.outbox) = Outbox::Closed;
        let pending: Vec<PendingCall> = lock(&self.shared.pending).drain().map(|(_, tx)| tx).collect();
        debug!(target: "session", ?reason, rejected = pending.len(), "session_closed");
        for caller in pending {
            let _ = caller.send(Err(SessionError::Closed));
        }
        self.shared.disconnects.publish(reason);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
