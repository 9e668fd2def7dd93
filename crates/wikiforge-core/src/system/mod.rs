//! # System Module
//!
//! Stage contract, sequencing and the assembled pipeline.
//!
//! - [`stage`]: the [`Stage`] trait, lifecycle states and per-stage reports
//! - [`sequencer`]: dependency validation and ordered, fail-fast execution
//! - [`pipeline`]: a sequencer bundled with the config, store, pool and facets
//!   of one run

mod pipeline;
mod sequencer;
mod stage;

pub use pipeline::Pipeline;
pub use sequencer::{RunReport, Sequencer, StageRecord, StageStatus};
pub use stage::{Stage, StageContext, StageDescriptor, StageReport, StageState};
