//! # Stage Sequencer
//!
//! Runs the registered stages strictly in order on the calling thread.
//!
//! Construction validates the declared dependencies: every required artifact
//! must be produced by an earlier stage, stage names are unique, and no
//! artifact has two producers. A violation is a programming error reported as
//! `InvalidStageOrder` before anything runs.

use super::stage::{Stage, StageContext, StageDescriptor, StageReport, StageState};
use crate::artifact::ArtifactKey;
use crate::types::ForgeError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Outcome of one stage in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub name: &'static str,
    pub state: StageState,
    pub report: Option<StageReport>,
}

/// Result of a sequencer run: one record per registered stage, plus the
/// error that halted the run, if any.
#[derive(Debug)]
pub struct RunReport {
    pub records: Vec<StageRecord>,
    pub failure: Option<ForgeError>,
}

impl RunReport {
    /// Whether every stage completed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Record of the named stage.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// The records, or the halting error.
    pub fn into_result(self) -> Result<Vec<StageRecord>, ForgeError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.records),
        }
    }
}

/// Presence of one stage's outputs on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub descriptor: StageDescriptor,
    pub present: Vec<ArtifactKey>,
    pub missing: Vec<PathBuf>,
}

impl StageStatus {
    /// Whether every output is present.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Validated, ordered stage list.
pub struct Sequencer {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stages.iter().map(|s| s.name())).finish()
    }
}

impl Sequencer {
    /// Validate and register `stages` in execution order.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, ForgeError> {
        let mut names = BTreeSet::new();
        let mut producers: BTreeMap<ArtifactKey, &'static str> = BTreeMap::new();

        for stage in &stages {
            let name = stage.name();
            if !names.insert(name) {
                return Err(ForgeError::InvalidStageOrder(format!("stage '{name}' is registered twice")));
            }
            for key in stage.requires() {
                if !producers.contains_key(&key) {
                    return Err(ForgeError::InvalidStageOrder(format!(
                        "stage '{name}' requires {key}, which no earlier stage produces"
                    )));
                }
            }
            for key in stage.produces() {
                if let Some(other) = producers.insert(key, name) {
                    return Err(ForgeError::InvalidStageOrder(format!(
                        "{key} is produced by both '{other}' and '{name}'"
                    )));
                }
            }
        }
        Ok(Self { stages })
    }

    /// Descriptors in execution order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<StageDescriptor> {
        self.stages
            .iter()
            .enumerate()
            .map(|(ordinal, stage)| StageDescriptor::of(stage.as_ref(), ordinal))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, halting at the first failure.
    pub fn run(&self, ctx: &StageContext<'_>) -> RunReport {
        let mut records: Vec<StageRecord> = self
            .stages
            .iter()
            .map(|stage| StageRecord {
                name: stage.name(),
                state: StageState::Pending,
                report: None,
            })
            .collect();

        for (stage, record) in self.stages.iter().zip(records.iter_mut()) {
            let name = stage.name();
            let produces = stage.produces();

            if ctx.config.skip_completed
                && !produces.is_empty()
                && produces.iter().all(|key| ctx.store.is_present(ctx.snapshot(), key))
            {
                tracing::info!(stage = name, "outputs present, skipping");
                record.state = StageState::Completed { reused: true };
                continue;
            }

            if let Some(missing) = stage
                .requires()
                .iter()
                .find(|key| !ctx.store.is_present(ctx.snapshot(), key))
            {
                let err = ForgeError::Precondition {
                    stage: name.to_string(),
                    artifact: ctx.store.presence_path(ctx.snapshot(), missing),
                };
                tracing::error!(stage = name, error = %err, "precondition failed");
                record.state = StageState::Failed;
                return RunReport {
                    failure: Some(err.in_stage(name)),
                    records,
                };
            }

            record.state = StageState::Running;
            let span = tracing::info_span!("stage", name);
            let _entered = span.enter();
            tracing::info!("stage started");

            match stage.run(ctx) {
                Ok(report) => {
                    tracing::info!(
                        records = report.records,
                        skipped = report.skipped,
                        chunks_computed = report.chunks_computed,
                        chunks_reused = report.chunks_reused,
                        "stage completed"
                    );
                    record.state = StageState::Completed { reused: false };
                    record.report = Some(report);
                }
                Err(err) => {
                    tracing::error!(error = %err, "stage failed");
                    record.state = StageState::Failed;
                    return RunReport {
                        failure: Some(err.in_stage(name)),
                        records,
                    };
                }
            }
        }

        RunReport {
            records,
            failure: None,
        }
    }

    /// Which outputs of each stage are present on disk.
    #[must_use]
    pub fn status(&self, ctx: &StageContext<'_>) -> Vec<StageStatus> {
        self.descriptors()
            .into_iter()
            .map(|descriptor| {
                let (present, missing): (Vec<ArtifactKey>, Vec<ArtifactKey>) = descriptor
                    .produces
                    .iter()
                    .partition(|key| ctx.store.is_present(ctx.snapshot(), key));
                StageStatus {
                    missing: missing
                        .iter()
                        .map(|key| ctx.store.presence_path(ctx.snapshot(), key))
                        .collect(),
                    present,
                    descriptor,
                }
            })
            .collect()
    }
}
