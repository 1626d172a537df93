/*! Progress accounting.

Workers own local counters and add them to a shared [Progress] every `update_interval` documents,
so that the shared atomics are not hammered once per record.
A [ProgressReporter] can periodically log the aggregate from a background thread.
!*/
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Serialize;

/// Shared, order-insensitive counters.
#[derive(Debug, Default)]
pub struct Progress {
    shards: AtomicU64,
    skipped_shards: AtomicU64,
    failed_shards: AtomicU64,
    documents: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
    nones: AtomicU64,
}

/// Snapshot of a [Progress].
///
/// Record level counts only cover completed shards: whatever a failed shard had counted is taken back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    /// Completed shards, skipped ones included.
    pub shards: u64,
    /// Shards whose output already existed.
    pub skipped_shards: u64,
    pub failed_shards: u64,
    /// Records handed to the transform.
    pub documents: u64,
    /// Records the transform discarded.
    pub dropped: u64,
    /// Lines that could not be decoded.
    pub malformed: u64,
    /// Lines holding a bare JSON `null`, which are left out of the output.
    pub nones: u64,
}

impl fmt::Display for ProgressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shards ({} skipped, {} failed), {} documents ({} dropped, {} malformed, {} null)",
            self.shards,
            self.skipped_shards,
            self.failed_shards,
            self.documents,
            self.dropped,
            self.malformed,
            self.nones
        )
    }
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            shards: self.shards.load(Ordering::Relaxed),
            skipped_shards: self.skipped_shards.load(Ordering::Relaxed),
            failed_shards: self.failed_shards.load(Ordering::Relaxed),
            documents: self.documents.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            nones: self.nones.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn shard_done(&self) {
        self.shards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shard_skipped(&self) {
        self.skipped_shards.fetch_add(1, Ordering::Relaxed);
        self.shards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shard_failed(&self) {
        self.failed_shards.fetch_add(1, Ordering::Relaxed);
    }

    fn add(&self, counts: &Counts) {
        self.documents.fetch_add(counts.documents, Ordering::Relaxed);
        self.dropped.fetch_add(counts.dropped, Ordering::Relaxed);
        self.malformed.fetch_add(counts.malformed, Ordering::Relaxed);
        self.nones.fetch_add(counts.nones, Ordering::Relaxed);
    }

    fn retract(&self, counts: &Counts) {
        self.documents.fetch_sub(counts.documents, Ordering::Relaxed);
        self.dropped.fetch_sub(counts.dropped, Ordering::Relaxed);
        self.malformed.fetch_sub(counts.malformed, Ordering::Relaxed);
        self.nones.fetch_sub(counts.nones, Ordering::Relaxed);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    documents: u64,
    dropped: u64,
    malformed: u64,
    nones: u64,
}

impl Counts {
    fn merge(&mut self, other: &Counts) {
        self.documents += other.documents;
        self.dropped += other.dropped;
        self.malformed += other.malformed;
        self.nones += other.nones;
    }
}

/// Per-shard counters, added to a [Progress] every `interval` documents.
///
/// A counter dropped without [ShardCounter::finish] belongs to a failed shard:
/// what it already added to the [Progress] is subtracted again.
pub(crate) struct ShardCounter<'a> {
    progress: &'a Progress,
    interval: u64,
    pending: Counts,
    flushed: Counts,
    finished: bool,
}

impl<'a> ShardCounter<'a> {
    pub fn new(progress: &'a Progress, interval: u64) -> Self {
        Self {
            progress,
            interval: interval.max(1),
            pending: Counts::default(),
            flushed: Counts::default(),
            finished: false,
        }
    }

    pub fn document(&mut self) {
        self.pending.documents += 1;
        if self.pending.documents >= self.interval {
            self.flush();
        }
    }

    pub fn dropped(&mut self) {
        self.pending.dropped += 1;
    }

    pub fn malformed(&mut self) {
        self.pending.malformed += 1;
    }

    pub fn none(&mut self) {
        self.pending.nones += 1;
    }

    pub fn flush(&mut self) {
        self.progress.add(&self.pending);
        self.flushed.merge(&self.pending);
        self.pending = Counts::default();
    }

    /// The shard is complete: its counts are final.
    pub fn finish(mut self) {
        self.flush();
        self.finished = true;
    }
}

impl Drop for ShardCounter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.progress.retract(&self.flushed);
        }
    }
}

/// Background thread logging a [Progress] at a fixed period.
pub struct ProgressReporter {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(progress: Arc<Progress>, every: Duration) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            loop {
                match stopped.recv_timeout(every) {
                    Err(RecvTimeoutError::Timeout) => {
                        let summary = progress.summary();
                        let elapsed = start.elapsed().as_secs_f64();
                        info!(
                            "{} in {:.0}s ({:.1} documents/s)",
                            summary,
                            elapsed,
                            summary.documents as f64 / elapsed.max(f64::EPSILON)
                        );
                    }
                    // stop requested, or the sender is gone
                    _ => break,
                }
            }
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("progress reporter panicked");
        }
    }
}
