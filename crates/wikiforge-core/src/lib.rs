//! # wikiforge-core
//!
//! The staged pipeline engine for wikiforge.
//!
//! This crate turns a Wikipedia dump and a Wikidata dump of one snapshot
//! into a chain of derived corpus artifacts: cleaned tables, resolved
//! redirects, parsed article text, link tables and per-article statistics.
//!
//! ## Architecture
//!
//! - `config` resolves the effective run configuration from layered sources
//! - `artifact` maps artifact keys to paths and decides presence
//! - `partition` and `pool` split chunked stages and run them on a fixed
//!   set of scoped worker threads
//! - `system` holds the `Stage` contract, the sequencer and the `Pipeline`
//! - `stages` holds the eighteen concrete stages
//! - `facet` holds the collaborators reached only through traits
//!
//! ## Constraints
//!
//! - Synchronous: no async runtime, no network code in the engine
//! - Deterministic: ordered maps in every output, integer arithmetic only
//! - Stages communicate only through artifacts in the store

// =============================================================================
// MODULES
// =============================================================================

pub mod artifact;
pub mod config;
pub mod facet;
pub mod formats;
pub mod partition;
pub mod pool;
pub mod primitives;
pub mod redirect;
pub mod stages;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{ForgeError, RecordTally};

// =============================================================================
// RE-EXPORTS: Configuration & Artifacts
// =============================================================================

pub use artifact::{ArtifactKey, ArtifactStore, Corpus, Format, Layer};
pub use config::{
    ConfigOverrides, Defaults, DownloadJob, EffectiveConfig, EntityCap, SkipTolerance, Snapshot,
    SnapshotDate, resolve,
};

// =============================================================================
// RE-EXPORTS: Execution
// =============================================================================

pub use partition::{ChunkDescriptor, ChunkManifest, ChunkRange};
pub use pool::{PoolReport, WorkerPool};
pub use redirect::{CanonicalRedirects, RedirectEdge, RedirectKind, RedirectResolver};

// =============================================================================
// RE-EXPORTS: System
// =============================================================================

pub use facet::Facets;
pub use stages::standard_pipeline;
pub use system::{
    Pipeline, RunReport, Sequencer, Stage, StageContext, StageDescriptor, StageRecord, StageReport,
    StageState, StageStatus,
};
