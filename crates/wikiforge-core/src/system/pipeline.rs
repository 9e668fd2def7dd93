//! A ready-to-run pipeline for one [`EffectiveConfig`].

use super::sequencer::{RunReport, Sequencer, StageStatus};
use super::stage::{Stage, StageContext, StageDescriptor};
use crate::artifact::ArtifactStore;
use crate::config::EffectiveConfig;
use crate::facet::Facets;
use crate::pool::WorkerPool;
use crate::stages::standard_pipeline;
use crate::types::ForgeError;

/// Owns everything one run needs.
#[derive(Debug)]
pub struct Pipeline {
    config: EffectiveConfig,
    store: ArtifactStore,
    pool: WorkerPool,
    facets: Facets,
    sequencer: Sequencer,
}

impl Pipeline {
    /// The standard stage list with the given collaborators.
    pub fn new(config: EffectiveConfig, facets: Facets) -> Result<Self, ForgeError> {
        Self::with_stages(config, facets, standard_pipeline())
    }

    /// A custom stage list, validated in order.
    pub fn with_stages(
        config: EffectiveConfig,
        facets: Facets,
        stages: Vec<Box<dyn Stage>>,
    ) -> Result<Self, ForgeError> {
        let sequencer = Sequencer::new(stages)?;
        let pool = WorkerPool::new(config.workers, config.skip_tolerance);
        Ok(Self {
            config,
            store: ArtifactStore::new(),
            pool,
            facets,
            sequencer,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<StageDescriptor> {
        self.sequencer.descriptors()
    }

    /// Execute every stage.
    pub fn run(&self) -> RunReport {
        let snapshot = &self.config.snapshot;
        tracing::info!(
            wikipedia = %snapshot.wikipedia,
            wikidata = %snapshot.wikidata,
            wiki = %snapshot.wiki,
            stages = self.sequencer.len(),
            workers = self.pool.workers().get(),
            max_entities = %self.config.max_entities,
            "pipeline starting"
        );
        let report = self.sequencer.run(&self.context());
        if report.succeeded() {
            tracing::info!("pipeline finished");
        }
        report
    }

    /// Output presence per stage.
    #[must_use]
    pub fn status(&self) -> Vec<StageStatus> {
        self.sequencer.status(&self.context())
    }

    fn context(&self) -> StageContext<'_> {
        StageContext {
            config: &self.config,
            store: &self.store,
            pool: &self.pool,
            facets: &self.facets,
        }
    }
}
