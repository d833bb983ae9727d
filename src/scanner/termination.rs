use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use crate::model::ShutdownReason;
use crate::scanner::queue::WorkQueue;
use crate::scanner::shutdown::ShutdownController;

/// Number of workers currently expanding a dequeued directory.
#[derive(Debug, Default)]
pub struct InFlightCounter(AtomicUsize);

impl InFlightCounter {
    pub fn current(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        let previous = self.0.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "in-flight counter underflow");
    }
}

/// Declares the walk finished once nothing is queued and nothing is being
/// expanded, then stops the walk through the shared shutdown controller.
pub struct TerminationDetector {
    in_flight: InFlightCounter,
    shutdown: ShutdownController,
}

impl TerminationDetector {
    pub fn new(shutdown: ShutdownController) -> Self {
        Self {
            in_flight: InFlightCounter::default(),
            shutdown,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Must only be called by the queue while it holds its dequeue lock.
    pub(crate) fn claim(&self) {
        self.in_flight.begin();
    }

    /// Called once a claimed directory is fully expanded. Every push for that
    /// directory has been issued by now.
    pub(crate) fn release(&self, queue: &WorkQueue) {
        self.in_flight.finish();
        self.check(queue);
    }

    /// Returns `true` when the walk is drained. Triggers completion on the
    /// first drained observation.
    pub fn check(&self, queue: &WorkQueue) -> bool {
        if !queue.is_drained(&self.in_flight) {
            return false;
        }
        if self.shutdown.trigger(ShutdownReason::Completed) {
            info!("queue drained with no directory in flight, walk complete");
        }
        true
    }
}
