//! Concurrent directory walk.
//!
//! The root is queued once, then a fixed pool of workers repeatedly takes a
//! directory from the bounded queue, writes a record for every child and
//! queues the child directories. The walk ends when the termination detector
//! sees an empty queue with nothing in flight, or when shutdown is requested
//! from outside (signal handler or caller).

pub mod metadata;
pub mod queue;
pub mod shutdown;
pub mod termination;
pub mod worker;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::model::{ShutdownReason, WalkOptions, WalkStats, WalkSummary};
use crate::report::ReportSink;

pub use queue::{ClaimedDir, PushOutcome, WorkQueue};
pub use shutdown::ShutdownController;
pub use termination::{InFlightCounter, TerminationDetector};
pub use worker::WorkerPool;

/// Everything the workers share for one walk.
pub struct ScanContext {
    pub queue: WorkQueue,
    pub detector: TerminationDetector,
    pub shutdown: ShutdownController,
    pub sink: ReportSink,
    pub stats: WalkStats,
}

impl ScanContext {
    pub fn new(options: &WalkOptions, sink: ReportSink) -> Self {
        let shutdown = ShutdownController::new();
        Self {
            queue: WorkQueue::new(options.queue_capacity, options.workers, shutdown.clone()),
            detector: TerminationDetector::new(shutdown.clone()),
            shutdown,
            sink,
            stats: WalkStats::default(),
        }
    }
}

pub struct Scanner {
    ctx: Arc<ScanContext>,
    workers: usize,
}

impl Scanner {
    pub fn new(options: &WalkOptions, sink: ReportSink) -> Result<Self, AppError> {
        if options.workers == 0 {
            return Err(AppError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if options.queue_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            ctx: Arc::new(ScanContext::new(options, sink)),
            workers: options.workers,
        })
    }

    /// Handle for stopping the walk from another thread or a signal handler.
    pub fn shutdown_handle(&self) -> ShutdownController {
        self.ctx.shutdown.clone()
    }

    /// Walks `root` to completion or until shutdown, blocking the caller.
    pub fn run(self, root: &Path) -> Result<WalkSummary, AppError> {
        let started = Instant::now();
        info!(
            root = %root.display(),
            workers = self.workers,
            queue_capacity = self.ctx.queue.capacity(),
            "starting walk"
        );

        if self.ctx.queue.push(root.to_path_buf()) != PushOutcome::Enqueued {
            debug!("root not queued, walk already stopped");
        }

        let pool = WorkerPool::spawn(&self.ctx, self.workers)?;
        pool.join();

        if let Err(error) = self.ctx.sink.flush() {
            warn!(%error, "failed to flush report");
        }

        // Workers only exit after shutdown, so a reason is recorded by now.
        let reason = self
            .ctx
            .shutdown
            .reason()
            .unwrap_or(ShutdownReason::Interrupted);
        let summary = self.ctx.stats.snapshot(reason, started.elapsed());

        info!(
            ?reason,
            records = summary.records_written,
            dirs = summary.dirs_expanded,
            skipped_entries = summary.entries_skipped,
            unreadable_dirs = summary.dirs_unreadable,
            duration_ms = summary.duration.as_millis() as u64,
            "walk finished"
        );
        Ok(summary)
    }
}
