use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// Paths at or beyond this many bytes are never queued for expansion.
pub const MAX_PATH_LEN: usize = 4096;

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FsEntryKind {
    Dir,
    File,
    Symlink,
    Other,
}

impl fmt::Display for FsEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Dir => "Directory",
            Self::File => "Regular File",
            Self::Symlink => "Symbolic Link",
            Self::Other => "Other",
        };
        write!(f, "{label}")
    }
}

/// Metadata for one visited entry. Built right before it is written and
/// dropped right after.
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    pub path: PathBuf,
    pub size: u64,
    pub kind: FsEntryKind,
    pub permissions: u32,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShutdownReason {
    /// Queue drained with nothing in flight.
    Completed,
    /// Operator signal or an explicit caller request.
    Interrupted,
}

#[derive(Debug, Default)]
pub struct WalkStats {
    pub records_written: AtomicU64,
    pub entries_skipped: AtomicU64,
    pub dirs_expanded: AtomicU64,
    pub dirs_unreadable: AtomicU64,
    pub write_failures: AtomicU64,
    pub pushes_discarded: AtomicU64,
    pub paths_too_long: AtomicU64,
    pub inline_expansions: AtomicU64,
}

impl WalkStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, reason: ShutdownReason, duration: Duration) -> WalkSummary {
        WalkSummary {
            reason,
            records_written: self.records_written.load(Ordering::Relaxed),
            entries_skipped: self.entries_skipped.load(Ordering::Relaxed),
            dirs_expanded: self.dirs_expanded.load(Ordering::Relaxed),
            dirs_unreadable: self.dirs_unreadable.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            pushes_discarded: self.pushes_discarded.load(Ordering::Relaxed),
            paths_too_long: self.paths_too_long.load(Ordering::Relaxed),
            inline_expansions: self.inline_expansions.load(Ordering::Relaxed),
            duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkSummary {
    pub reason: ShutdownReason,
    pub records_written: u64,
    pub entries_skipped: u64,
    pub dirs_expanded: u64,
    pub dirs_unreadable: u64,
    pub write_failures: u64,
    pub pushes_discarded: u64,
    pub paths_too_long: u64,
    pub inline_expansions: u64,
    pub duration: Duration,
}

impl WalkSummary {
    pub fn completed(&self) -> bool {
        self.reason == ShutdownReason::Completed
    }
}
