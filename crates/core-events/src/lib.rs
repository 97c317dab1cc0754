//! Typed publish/subscribe topics for the core's outward event surface.
//!
//! One `Topic<T>` per event kind replaces a single untyped emitter: consumers
//! subscribe to exactly the payloads they understand, with no downcasting at
//! the receiving end. Delivery contract:
//!
//! * Per subscriber, events arrive in publish order (channel FIFO).
//! * Every live subscriber receives every event published after it subscribed
//!   (fan-out, not work-stealing).
//! * A dropped receiver is pruned on the next publish; publishing never
//!   blocks and never fails.
//!
//! Channels are unbounded. Producers are the redraw pump and the buffer sync
//! manager, whose volume is already bounded upstream by the dirty-set
//! coalescing model, so a slow consumer delays only itself.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

// Telemetry: pruned subscriber count across all topics. Inspected in tests
// and periodically logged by the runtime.
pub static SUBSCRIBERS_PRUNED: AtomicU64 = AtomicU64::new(0);

/// A single event kind's fan-out registry.
///
/// Interior mutability so publishers and subscribers share `&Topic<T>`
/// (typically through the owning pipeline struct). The mutex guards only the
/// subscriber list; payload delivery happens outside critical sections via
/// the channel handles.
#[derive(Debug)]
pub struct Topic<T: Clone> {
    name: &'static str,
    subs: Mutex<Vec<UnboundedSender<T>>>,
}

impl<T: Clone> Topic<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subs: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a new subscriber. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = unbounded_channel();
        self.subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Deliver `event` to every live subscriber, pruning closed ones.
    pub fn publish(&self, event: T) {
        let mut subs = self
            .subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subs.len();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        let pruned = before - subs.len();
        if pruned > 0 {
            SUBSCRIBERS_PRUNED.fetch_add(pruned as u64, Ordering::Relaxed);
            trace!(target: "events.topic", topic = self.name, pruned, "subscribers_pruned");
        }
    }
}
