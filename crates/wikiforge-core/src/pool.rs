//! # Worker Pool
//!
//! Fan-out/fan-in executor for chunked stages.
//!
//! Chunks are claimed from a shared atomic cursor by at most `workers` scoped
//! threads. Each result travels back over a `crossbeam-channel` and is
//! reassembled by chunk index, so completion order never shows in the report.
//!
//! ## Failure Semantics
//!
//! - A chunk whose outputs all exist is `Reused`; its transform is not called.
//!   Callers retire outputs written under a different plan beforehand
//!   ([`ChunkManifest::retire_stale`])
//! - A transform error, a panic, or a skip ratio above tolerance fails the chunk
//! - A failed chunk's outputs are removed, so a later run recomputes it
//! - The first failure raises the cancel flag; unclaimed chunks never start,
//!   claimed chunks run to completion
//! - The lowest failing chunk index is reported, together with every index
//!   that did not complete

use crate::config::SkipTolerance;
use crate::formats::remove_if_present;
use crate::partition::{ChunkDescriptor, ChunkManifest};
use crate::types::{ForgeError, RecordTally};
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// Records written and skipped by one chunk transform.
pub type ChunkStats = RecordTally;

// =============================================================================
// OUTCOMES
// =============================================================================

/// How a chunk completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The transform ran.
    Computed(ChunkStats),
    /// Outputs were already on disk.
    Reused,
}

/// Completion record of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: u32,
    pub status: ChunkStatus,
}

/// Outcomes of a successful pool run, ordered by chunk index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub outcomes: Vec<ChunkOutcome>,
}

impl PoolReport {
    /// Sum of the computed chunks' tallies.
    #[must_use]
    pub fn tally(&self) -> RecordTally {
        self.outcomes
            .iter()
            .fold(RecordTally::default(), |acc, outcome| match outcome.status {
                ChunkStatus::Computed(stats) => acc.merge(stats),
                ChunkStatus::Reused => acc,
            })
    }

    #[must_use]
    pub fn computed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChunkStatus::Computed(_)))
            .count()
    }

    #[must_use]
    pub fn reused(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ChunkStatus::Reused)
            .count()
    }
}

// =============================================================================
// WORKER POOL
// =============================================================================

/// Bounded-concurrency chunk executor.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: NonZeroUsize,
    tolerance: SkipTolerance,
}

impl WorkerPool {
    #[must_use]
    pub fn new(workers: NonZeroUsize, tolerance: SkipTolerance) -> Self {
        Self { workers, tolerance }
    }

    /// Maximum number of concurrent transforms.
    #[must_use]
    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Skip tolerance applied to every chunk.
    #[must_use]
    pub fn tolerance(&self) -> SkipTolerance {
        self.tolerance
    }

    /// Run `transform` over every chunk of `manifest`.
    pub fn run<F>(&self, stage: &str, manifest: &ChunkManifest, transform: F) -> Result<PoolReport, ForgeError>
    where
        F: Fn(&ChunkDescriptor) -> Result<ChunkStats, ForgeError> + Sync,
    {
        let total = manifest.chunks.len();
        if total == 0 {
            tracing::info!(stage, "no chunks to process");
            return Ok(PoolReport::default());
        }
        let threads = self.workers.get().min(total);
        tracing::info!(stage, chunks = total, workers = threads, "fanning out");

        let cursor = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = crossbeam_channel::unbounded::<(usize, Result<ChunkStatus, String>)>();

        let mut results: Vec<Option<Result<ChunkStatus, String>>> = (0..total).map(|_| None).collect();

        thread::scope(|scope| {
            for _ in 0..threads {
                let tx = tx.clone();
                let cursor = &cursor;
                let cancelled = &cancelled;
                let transform = &transform;
                scope.spawn(move || {
                    while !cancelled.load(Ordering::Acquire) {
                        let slot = cursor.fetch_add(1, Ordering::AcqRel);
                        let Some(chunk) = manifest.chunks.get(slot) else {
                            break;
                        };
                        let result = self.run_chunk(stage, chunk, transform);
                        if result.is_err() {
                            cancelled.store(true, Ordering::Release);
                        }
                        if tx.send((slot, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (slot, result) in rx.iter() {
                if let Some(entry) = results.get_mut(slot) {
                    *entry = Some(result);
                }
            }
        });

        let mut outcomes = Vec::with_capacity(total);
        let mut failure: Option<(u32, String)> = None;
        let mut incomplete = Vec::new();
        for (chunk, result) in manifest.chunks.iter().zip(results) {
            match result {
                Some(Ok(status)) => outcomes.push(ChunkOutcome {
                    index: chunk.index,
                    status,
                }),
                Some(Err(reason)) => {
                    if failure.is_none() {
                        failure = Some((chunk.index, reason));
                    }
                    incomplete.push(chunk.index);
                }
                None => incomplete.push(chunk.index),
            }
        }

        match failure {
            Some((chunk, reason)) => {
                tracing::error!(stage, chunk, incomplete = ?incomplete, %reason, "chunk failed");
                Err(ForgeError::ChunkFatal {
                    chunk,
                    reason,
                    incomplete,
                })
            }
            None => {
                let report = PoolReport { outcomes };
                tracing::info!(
                    stage,
                    computed = report.computed(),
                    reused = report.reused(),
                    "fan-in complete"
                );
                Ok(report)
            }
        }
    }

    fn run_chunk<F>(&self, stage: &str, chunk: &ChunkDescriptor, transform: &F) -> Result<ChunkStatus, String>
    where
        F: Fn(&ChunkDescriptor) -> Result<ChunkStats, ForgeError> + Sync,
    {
        if !chunk.outputs.is_empty() && chunk.outputs.iter().all(|path| path.is_file()) {
            tracing::debug!(stage, chunk = chunk.index, "reusing chunk outputs");
            return Ok(ChunkStatus::Reused);
        }

        let result = match panic::catch_unwind(AssertUnwindSafe(|| transform(chunk))) {
            Err(payload) => Err(format!("transform panicked: {}", panic_message(payload.as_ref()))),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(stats)) if self.tolerance.exceeded(stats.records, stats.skipped) => Err(format!(
                "{} of {} records skipped, above tolerance of {} ppm",
                stats.skipped,
                stats.seen(),
                self.tolerance.ppm()
            )),
            Ok(Ok(stats)) => Ok(ChunkStatus::Computed(stats)),
        };

        match &result {
            Ok(_) => tracing::debug!(stage, chunk = chunk.index, "chunk complete"),
            Err(_) => {
                for path in &chunk.outputs {
                    if let Err(e) = remove_if_present(path) {
                        tracing::warn!(
                            stage,
                            chunk = chunk.index,
                            path = %path.display(),
                            error = %e,
                            "could not remove output of failed chunk"
                        );
                    }
                }
            }
        }
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::EntityCap;
    use crate::partition::partition;
    use std::path::Path;
    use std::sync::Mutex;

    fn manifest(dir: &Path, chunks: usize) -> ChunkManifest {
        let ranges = partition(chunks as u64, chunks, EntityCap::Unlimited).unwrap();
        ChunkManifest::for_ranges(&ranges, EntityCap::Unlimited, |i| {
            vec![dir.join(format!("out-{i}.txt"))]
        })
    }

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(NonZeroUsize::new(workers).unwrap(), SkipTolerance::strict())
    }

    fn write_output(chunk: &ChunkDescriptor) -> Result<ChunkStats, ForgeError> {
        std::fs::write(chunk.output(0)?, chunk.index.to_string())?;
        Ok(ChunkStats::new(1, 0))
    }

    #[test]
    fn outcomes_ordered_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let report = pool(4).run("t", &manifest(dir.path(), 9), write_output).unwrap();
        let indices: Vec<u32> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());
        assert_eq!(report.tally(), RecordTally::new(9, 0));
    }

    #[test]
    fn existing_outputs_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(dir.path(), 3);
        std::fs::write(&m.chunks[1].outputs[0], "1").unwrap();

        let calls = Mutex::new(Vec::new());
        let report = pool(2)
            .run("t", &m, |chunk| {
                calls.lock().unwrap().push(chunk.index);
                write_output(chunk)
            })
            .unwrap();

        let mut called = calls.into_inner().unwrap();
        called.sort_unstable();
        assert_eq!(called, vec![0, 2]);
        assert_eq!(report.reused(), 1);
        assert_eq!(report.computed(), 2);
    }

    #[test]
    fn panic_becomes_chunk_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = pool(1)
            .run("t", &manifest(dir.path(), 2), |chunk| {
                if chunk.index == 0 {
                    panic!("bad chunk");
                }
                write_output(chunk)
            })
            .unwrap_err();
        match err {
            ForgeError::ChunkFatal { chunk, reason, incomplete } => {
                assert_eq!(chunk, 0);
                assert!(reason.contains("bad chunk"));
                assert_eq!(incomplete, vec![0, 1]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn tolerance_escalates_and_removes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(dir.path(), 1);
        let tolerant = WorkerPool::new(NonZeroUsize::MIN, SkipTolerance::from_ppm(100_000).unwrap());

        let err = tolerant
            .run("t", &m, |chunk| {
                write_output(chunk)?;
                Ok(ChunkStats::new(8, 2))
            })
            .unwrap_err();
        assert!(matches!(err, ForgeError::ChunkFatal { chunk: 0, .. }));
        assert!(!m.chunks[0].outputs[0].exists());

        let ok = tolerant
            .run("t", &m, |chunk| {
                write_output(chunk)?;
                Ok(ChunkStats::new(9, 1))
            })
            .unwrap();
        assert_eq!(ok.tally(), RecordTally::new(9, 1));
    }

    #[test]
    fn unremovable_output_does_not_mask_the_failure() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(dir.path(), 1);
        std::fs::create_dir(&m.chunks[0].outputs[0]).unwrap();
        std::fs::write(m.chunks[0].outputs[0].join("inner"), "x").unwrap();

        let err = pool(1)
            .run("t", &m, |_| Err(ForgeError::Io("boom".into())))
            .unwrap_err();
        assert!(matches!(err, ForgeError::ChunkFatal { chunk: 0, .. }));
        assert!(m.chunks[0].outputs[0].is_dir());
    }

    #[test]
    fn lowest_failing_index_reported() {
        let dir = tempfile::tempdir().unwrap();
        let failed = Mutex::new(Vec::new());
        let err = pool(8)
            .run("t", &manifest(dir.path(), 8), |chunk| {
                if chunk.index >= 5 {
                    failed.lock().unwrap().push(chunk.index);
                    return Err(ForgeError::Io(format!("chunk {}", chunk.index)));
                }
                write_output(chunk)
            })
            .unwrap_err();
        let lowest = failed.into_inner().unwrap().into_iter().min().unwrap();
        match err {
            ForgeError::ChunkFatal { chunk, incomplete, .. } => {
                assert_eq!(chunk, lowest);
                assert!(incomplete.contains(&chunk));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_manifest_is_ok() {
        let report = pool(3).run("t", &ChunkManifest::default(), write_output).unwrap();
        assert!(report.outcomes.is_empty());
    }
}
