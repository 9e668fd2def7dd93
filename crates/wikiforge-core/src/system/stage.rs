//! # Stage Contract
//!
//! A stage is one transformation of the pipeline. It declares the artifacts
//! it reads and writes; the sequencer uses the declarations to validate the
//! stage order, check preconditions and decide whether a stage can be
//! skipped.
//!
//! ## Stage Lifecycle
//!
//! | State | Meaning |
//! |-------|---------|
//! | `Pending` | not yet reached |
//! | `Running` | preconditions hold, `run` is executing |
//! | `Completed { reused: false }` | `run` returned successfully |
//! | `Completed { reused: true }` | skipped; every output was already present |
//! | `Failed` | precondition missing or `run` returned an error |

use crate::artifact::{ArtifactKey, ArtifactStore};
use crate::config::{EffectiveConfig, Snapshot};
use crate::facet::Facets;
use crate::pool::{PoolReport, WorkerPool};
use crate::types::{ForgeError, RecordTally};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// STAGE TRAIT
// =============================================================================

/// One pipeline transformation.
pub trait Stage: Send + Sync {
    /// Unique, snake_case stage name.
    fn name(&self) -> &'static str;

    /// Artifacts that must be present before the stage runs.
    fn requires(&self) -> Vec<ArtifactKey>;

    /// Artifacts the stage writes.
    fn produces(&self) -> Vec<ArtifactKey>;

    /// Execute the stage.
    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError>;
}

/// Static description of a registered stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: &'static str,
    pub ordinal: usize,
    pub requires: Vec<ArtifactKey>,
    pub produces: Vec<ArtifactKey>,
}

impl StageDescriptor {
    /// Describe `stage` at position `ordinal`.
    #[must_use]
    pub fn of(stage: &dyn Stage, ordinal: usize) -> Self {
        Self {
            name: stage.name(),
            ordinal,
            requires: stage.requires(),
            produces: stage.produces(),
        }
    }
}

// =============================================================================
// STATE & REPORT
// =============================================================================

/// Lifecycle state of a stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Running,
    Completed { reused: bool },
    Failed,
}

impl StageState {
    /// Whether the state is final for this run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Completed { .. } | StageState::Failed)
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageState::Pending => f.write_str("pending"),
            StageState::Running => f.write_str("running"),
            StageState::Completed { reused: false } => f.write_str("completed"),
            StageState::Completed { reused: true } => f.write_str("reused"),
            StageState::Failed => f.write_str("failed"),
        }
    }
}

/// Counters returned by a successful stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageReport {
    pub records: u64,
    pub skipped: u64,
    pub chunks_computed: usize,
    pub chunks_reused: usize,
}

impl StageReport {
    /// Report of a sequential stage.
    #[must_use]
    pub fn from_tally(tally: RecordTally) -> Self {
        Self {
            records: tally.records,
            skipped: tally.skipped,
            ..Self::default()
        }
    }

    /// Report of a chunked stage.
    #[must_use]
    pub fn from_pool(report: &PoolReport) -> Self {
        let tally = report.tally();
        Self {
            records: tally.records,
            skipped: tally.skipped,
            chunks_computed: report.computed(),
            chunks_reused: report.reused(),
        }
    }
}

// =============================================================================
// STAGE CONTEXT
// =============================================================================

/// Everything a stage may use while running. Read-only.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a EffectiveConfig,
    pub store: &'a ArtifactStore,
    pub pool: &'a WorkerPool,
    pub facets: &'a Facets,
}

impl StageContext<'_> {
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.config.snapshot
    }

    /// Path of `key` (or one of its chunks) in this run's snapshot.
    #[must_use]
    pub fn locate(&self, key: &ArtifactKey, chunk: Option<u32>) -> PathBuf {
        self.store.locate(self.snapshot(), key, chunk)
    }

    /// Apply the skip tolerance to a sequential stage, which counts as a
    /// single chunk 0.
    pub fn check_tolerance(&self, tally: RecordTally) -> Result<(), ForgeError> {
        let tolerance = self.pool.tolerance();
        if tolerance.exceeded(tally.records, tally.skipped) {
            return Err(ForgeError::ChunkFatal {
                chunk: 0,
                reason: format!(
                    "{} of {} records skipped, above tolerance of {} ppm",
                    tally.skipped,
                    tally.seen(),
                    tolerance.ppm()
                ),
                incomplete: vec![0],
            });
        }
        Ok(())
    }
}
