//! Bounded FIFO of directories waiting to be expanded.
//!
//! Backed by a `crossbeam_channel::bounded` channel, which provides the
//! capacity limit and the "space available" / "item available" wake-ups. A
//! separate dequeue lock makes "take an item and mark it in flight" a single
//! step with respect to the termination check, so the check can never see an
//! item that has left the queue without also seeing it in flight.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::scanner::shutdown::ShutdownController;
use crate::scanner::termination::{InFlightCounter, TerminationDetector};

/// How long a blocked pop waits before re-running the termination check.
const POP_POLL: Duration = Duration::from_millis(50);

/// How long a blocked push waits before re-checking for a pool-wide stall.
const STALL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Shutdown is underway; the path was dropped.
    Discarded,
    /// Every producer is blocked on a full queue. The caller gets the path
    /// back and must expand it itself.
    Stalled(PathBuf),
}

pub struct WorkQueue {
    tx: Sender<PathBuf>,
    rx: Receiver<PathBuf>,
    capacity: usize,
    dequeue: Mutex<()>,
    shutdown: ShutdownController,
    producers: usize,
    stalled: AtomicUsize,
}

impl WorkQueue {
    /// `producers` is the number of threads that push while also being the
    /// only consumers (the worker pool size).
    pub fn new(capacity: usize, producers: usize, shutdown: ShutdownController) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            dequeue: Mutex::new(()),
            shutdown,
            producers: producers.max(1),
            stalled: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Appends `path`, blocking while the queue is full and the walk is live.
    pub fn push(&self, path: PathBuf) -> PushOutcome {
        if !self.shutdown.is_live() {
            return PushOutcome::Discarded;
        }

        let path = match self.tx.try_send(path) {
            Ok(()) => return PushOutcome::Enqueued,
            Err(TrySendError::Full(path)) => path,
            Err(TrySendError::Disconnected(_)) => return PushOutcome::Discarded,
        };

        let _stalled = StallGuard::enter(&self.stalled);
        loop {
            if !self.shutdown.is_live() {
                return PushOutcome::Discarded;
            }
            if self.stalled.load(Ordering::SeqCst) >= self.producers {
                return PushOutcome::Stalled(path);
            }

            let mut sel = Select::new();
            let send_index = sel.send(&self.tx);
            let cancel_index = sel.recv(self.shutdown.cancelled());
            match sel.select_timeout(STALL_POLL) {
                Ok(oper) if oper.index() == send_index => {
                    return match oper.send(&self.tx, path) {
                        Ok(()) => PushOutcome::Enqueued,
                        Err(_) => PushOutcome::Discarded,
                    };
                }
                Ok(oper) => {
                    debug_assert_eq!(oper.index(), cancel_index);
                    let _ = oper.recv(self.shutdown.cancelled());
                    return PushOutcome::Discarded;
                }
                Err(_) => {}
            }
        }
    }

    /// Takes the oldest directory and marks it in flight. Blocks while the
    /// queue is empty and the walk is live, running the termination check
    /// before each wait. Returns `None` once the walk is stopped and nothing
    /// is left to take.
    pub fn pop<'a>(&'a self, detector: &'a TerminationDetector) -> Option<ClaimedDir<'a>> {
        loop {
            {
                let _dequeue = self.dequeue.lock();
                if let Ok(path) = self.rx.try_recv() {
                    detector.claim();
                    return Some(ClaimedDir {
                        path,
                        queue: self,
                        detector,
                    });
                }
            }

            if !self.shutdown.is_live() {
                return None;
            }
            if detector.check(self) {
                continue;
            }
            self.wait_for_item();
        }
    }

    /// Consistent "nothing queued, nothing in flight" observation. In-flight
    /// is read first: increments only happen under the dequeue lock, so a zero
    /// here means nobody can push until the lock is released.
    pub(crate) fn is_drained(&self, in_flight: &InFlightCounter) -> bool {
        let _dequeue = self.dequeue.lock();
        in_flight.current() == 0 && self.rx.is_empty()
    }

    fn wait_for_item(&self) {
        let mut sel = Select::new();
        sel.recv(&self.rx);
        sel.recv(self.shutdown.cancelled());
        let _ = sel.ready_timeout(POP_POLL);
    }
}

/// A dequeued directory owned by one worker. Dropping it ends the in-flight
/// period and runs the termination check, also during unwinding.
pub struct ClaimedDir<'a> {
    path: PathBuf,
    queue: &'a WorkQueue,
    detector: &'a TerminationDetector,
}

impl ClaimedDir<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ClaimedDir<'_> {
    fn drop(&mut self) {
        self.detector.release(self.queue);
    }
}

struct StallGuard<'a>(&'a AtomicUsize);

impl<'a> StallGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for StallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
