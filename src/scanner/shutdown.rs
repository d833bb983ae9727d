use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use tracing::debug;

use crate::model::ShutdownReason;

/// Cancellation token shared by the queue, the termination detector and the
/// signal handler.
///
/// Nothing is ever sent on the broadcast channel. Dropping its only sender
/// disconnects every receiver at once, which wakes all threads selecting on
/// it regardless of which queue condition they wait for.
#[derive(Clone)]
pub struct ShutdownController {
    inner: Arc<Inner>,
}

struct Inner {
    live: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
    broadcast: Mutex<Option<Sender<()>>>,
    cancelled: Receiver<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                live: AtomicBool::new(true),
                reason: Mutex::new(None),
                broadcast: Mutex::new(Some(tx)),
                cancelled: rx,
            }),
        }
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Flips liveness to false and wakes every blocked queue operation.
    /// Returns `true` only for the call that actually stopped the walk.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = {
            let mut recorded = self.inner.reason.lock();
            if recorded.is_none() {
                *recorded = Some(reason);
                true
            } else {
                false
            }
        };

        self.inner.live.store(false, Ordering::SeqCst);
        drop(self.inner.broadcast.lock().take());

        if first {
            debug!(?reason, "shutdown triggered");
        }
        first
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.inner.reason.lock()
    }

    /// Becomes ready (disconnected) once shutdown has been triggered.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.inner.cancelled
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
