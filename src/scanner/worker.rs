use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::errors::AppError;
use crate::model::{FsEntryKind, MAX_PATH_LEN, ShutdownReason, WalkStats};
use crate::scanner::ScanContext;
use crate::scanner::metadata::resolve;
use crate::scanner::queue::PushOutcome;

/// Fixed set of named walker threads sharing one scan context.
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<()>)>,
}

impl WorkerPool {
    /// Spawns `count` workers. If any spawn fails the walk is stopped, the
    /// workers already running are joined and the error is returned.
    pub fn spawn(ctx: &Arc<ScanContext>, count: usize) -> Result<Self, AppError> {
        let mut pool = Self {
            handles: Vec::with_capacity(count),
        };

        for id in 0..count {
            let worker_ctx = Arc::clone(ctx);
            let spawned = thread::Builder::new()
                .name(format!("walker-{id}"))
                .spawn(move || worker_loop(id, &worker_ctx));

            match spawned {
                Ok(handle) => pool.handles.push((id, handle)),
                Err(source) => {
                    ctx.shutdown.trigger(ShutdownReason::Interrupted);
                    pool.join();
                    return Err(AppError::SpawnWorker { id, source });
                }
            }
        }

        debug!(count, "workers spawned");
        Ok(pool)
    }

    pub fn join(self) {
        for (id, handle) in self.handles {
            if handle.join().is_err() {
                warn!(worker = id, "worker panicked");
            }
        }
    }
}

fn worker_loop(id: usize, ctx: &ScanContext) {
    debug!(worker = id, "worker started");

    while ctx.shutdown.is_live() {
        let Some(claim) = ctx.queue.pop(&ctx.detector) else {
            break;
        };
        expand(id, claim.path(), ctx);
        // Dropping the claim leaves the in-flight state and runs the
        // termination check.
    }

    debug!(worker = id, "worker exiting");
}

/// Expands a claimed directory. Directories that could not be queued
/// because the whole pool is stalled are expanded here one after another,
/// so only one directory handle is open at a time.
pub(crate) fn expand(id: usize, dir: &Path, ctx: &ScanContext) {
    let mut stalled = Vec::new();
    list_directory(id, dir, ctx, &mut stalled);

    while let Some(path) = stalled.pop() {
        WalkStats::bump(&ctx.stats.inline_expansions);
        trace!(worker = id, path = %path.display(), "queue stalled, expanding inline");
        list_directory(id, &path, ctx, &mut stalled);
    }
}

/// Writes one record per child of `dir` and queues child directories.
/// Listing and stat failures are skipped, never fatal.
fn list_directory(id: usize, dir: &Path, ctx: &ScanContext, stalled: &mut Vec<PathBuf>) {
    if !ctx.shutdown.is_live() {
        return;
    }

    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(error) => {
            WalkStats::bump(&ctx.stats.dirs_unreadable);
            debug!(worker = id, path = %dir.display(), %error, "cannot list directory");
            return;
        }
    };
    WalkStats::bump(&ctx.stats.dirs_expanded);

    for entry in read_dir {
        if !ctx.shutdown.is_live() {
            break;
        }

        let child = match entry {
            Ok(entry) => entry.path(),
            Err(error) => {
                WalkStats::bump(&ctx.stats.entries_skipped);
                debug!(worker = id, path = %dir.display(), %error, "cannot read entry");
                continue;
            }
        };

        let record = match resolve(&child) {
            Ok(record) => record,
            Err(error) => {
                WalkStats::bump(&ctx.stats.entries_skipped);
                debug!(worker = id, path = %child.display(), %error, "cannot stat entry");
                continue;
            }
        };

        match ctx.sink.write_record(&record) {
            Ok(()) => WalkStats::bump(&ctx.stats.records_written),
            Err(error) => {
                WalkStats::bump(&ctx.stats.write_failures);
                warn!(worker = id, path = %child.display(), %error, "failed to write record");
            }
        }

        if record.kind == FsEntryKind::Dir {
            if let Some(path) = enqueue_subdir(id, record.path, ctx) {
                stalled.push(path);
            }
        }
    }
}

/// Returns the path back when the pool is stalled and the caller has to
/// expand it.
fn enqueue_subdir(id: usize, path: PathBuf, ctx: &ScanContext) -> Option<PathBuf> {
    if path.as_os_str().len() >= MAX_PATH_LEN {
        WalkStats::bump(&ctx.stats.paths_too_long);
        debug!(worker = id, path = %path.display(), "path too long to queue");
        return None;
    }

    match ctx.queue.push(path) {
        PushOutcome::Enqueued => None,
        PushOutcome::Discarded => {
            WalkStats::bump(&ctx.stats.pushes_discarded);
            None
        }
        PushOutcome::Stalled(path) => Some(path),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::Ordering;

    use tempfile::TempDir;

    use super::*;
    use crate::model::WalkOptions;
    use crate::report::ReportSink;

    fn context(workers: usize, queue_capacity: usize) -> ScanContext {
        ScanContext::new(
            &WalkOptions {
                workers,
                queue_capacity,
            },
            ReportSink::from_writer(io::sink()),
        )
    }

    #[test]
    fn expansion_records_children_and_queues_subdirs() {
        let temp = TempDir::new().expect("temp dir");
        fs::write(temp.path().join("a.txt"), vec![0_u8; 10]).expect("write");
        fs::create_dir(temp.path().join("sub")).expect("dir");

        let ctx = context(2, 8);
        expand(0, temp.path(), &ctx);

        assert_eq!(ctx.stats.records_written.load(Ordering::Relaxed), 2);
        assert_eq!(ctx.stats.dirs_expanded.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.queue.len(), 1);
    }

    #[test]
    fn unreadable_directory_is_skipped() {
        let temp = TempDir::new().expect("temp dir");
        let ctx = context(1, 8);
        expand(0, &temp.path().join("missing"), &ctx);

        assert_eq!(ctx.stats.dirs_unreadable.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.stats.records_written.load(Ordering::Relaxed), 0);
        assert!(ctx.queue.is_empty());
    }

    #[test]
    fn full_queue_with_single_worker_expands_inline() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("x").join("deep")).expect("dirs");
        fs::create_dir_all(temp.path().join("y").join("deep")).expect("dirs");

        let ctx = context(1, 1);
        expand(0, temp.path(), &ctx);

        // One of x/y is queued, the other is expanded inline along with its child.
        assert_eq!(ctx.stats.records_written.load(Ordering::Relaxed), 3);
        assert!(ctx.stats.inline_expansions.load(Ordering::Relaxed) >= 1);
        assert_eq!(ctx.queue.len(), 1);
    }

    #[test]
    fn stalled_deep_chain_is_walked_without_nesting_handles() {
        const DEPTH: usize = 1_500;

        let temp = TempDir::new().expect("temp dir");
        let mut chain = temp.path().to_path_buf();
        for _ in 0..DEPTH {
            chain.push("n");
        }
        fs::create_dir_all(&chain).expect("chain");
        fs::write(chain.join("leaf.txt"), b"x").expect("leaf");

        // A full queue makes every push stall, so the whole chain is
        // expanded by this one call.
        let ctx = context(1, 1);
        assert_eq!(ctx.queue.push(PathBuf::from("/occupied")), PushOutcome::Enqueued);
        expand(0, temp.path(), &ctx);

        assert_eq!(
            ctx.stats.records_written.load(Ordering::Relaxed),
            DEPTH as u64 + 1
        );
        assert_eq!(ctx.stats.dirs_unreadable.load(Ordering::Relaxed), 0);
        assert_eq!(ctx.stats.inline_expansions.load(Ordering::Relaxed), DEPTH as u64);
    }

    #[test]
    fn nothing_is_written_after_shutdown() {
        let temp = TempDir::new().expect("temp dir");
        fs::write(temp.path().join("a.txt"), b"x").expect("write");

        let ctx = context(1, 8);
        ctx.shutdown.trigger(ShutdownReason::Interrupted);
        expand(0, temp.path(), &ctx);

        assert_eq!(ctx.stats.records_written.load(Ordering::Relaxed), 0);
    }
}
