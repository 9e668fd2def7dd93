//! # Core Type Definitions
//!
//! This module contains the types shared by every part of the engine:
//! - Error taxonomy (`ForgeError`)
//! - Record counters (`RecordTally`)
//!
//! ## Error Taxonomy
//!
//! | Variant | Raised by | Effect |
//! |---------|-----------|--------|
//! | `Configuration` | config resolver, facets | fails before any stage runs |
//! | `Precondition` | sequencer | the stage is never started |
//! | `TransientRecord` | record readers | counted and skipped inside a chunk |
//! | `ChunkFatal` | worker pool | cancels sibling chunks, fails the stage |
//! | `StageFatal` | sequencer | halts the pipeline |
//!
//! Cycles found by the redirect resolver are not errors; they are reported as
//! tracing events.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// RECORD TALLY
// =============================================================================

/// Count of records a unit of work processed and skipped.
///
/// Uses saturating arithmetic so that very large dumps never overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordTally {
    /// Records written to the output.
    pub records: u64,
    /// Records dropped because of a transient error.
    pub skipped: u64,
}

impl RecordTally {
    /// Create a tally with the given counts.
    #[must_use]
    pub const fn new(records: u64, skipped: u64) -> Self {
        Self { records, skipped }
    }

    /// Count one written record.
    pub fn record(&mut self) {
        self.records = self.records.saturating_add(1);
    }

    /// Count one skipped record.
    pub fn skip(&mut self) {
        self.skipped = self.skipped.saturating_add(1);
    }

    /// Total records seen (written + skipped).
    #[must_use]
    pub const fn seen(&self) -> u64 {
        self.records.saturating_add(self.skipped)
    }

    /// Combine two tallies.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            records: self.records.saturating_add(other.records),
            skipped: self.skipped.saturating_add(other.skipped),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the wikiforge pipeline.
///
/// - No silent failures
/// - Use `Result<T, ForgeError>` for fallible operations
/// - Transient record errors are absorbed at the lowest level; every other
///   variant propagates unchanged until it terminates the run
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Bad or missing configuration input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required artifact is missing, so the stage cannot start.
    #[error("Stage '{stage}' is missing required artifact {}", artifact.display())]
    Precondition {
        /// The stage that refused to start.
        stage: String,
        /// Location of the missing artifact.
        artifact: PathBuf,
    },

    /// A single malformed input record.
    #[error("Malformed record at line {line}: {reason}")]
    TransientRecord {
        /// 1-based line (or row) number within the input.
        line: u64,
        /// Why the record was rejected.
        reason: String,
    },

    /// A chunk could not produce valid output.
    #[error("Chunk {chunk} failed: {reason} (incomplete chunks: {incomplete:?})")]
    ChunkFatal {
        /// Index of the failing chunk.
        chunk: u32,
        /// The underlying cause.
        reason: String,
        /// Chunk indices that had not completed when the stage stopped.
        incomplete: Vec<u32>,
    },

    /// A stage failed; the pipeline halts.
    #[error("Stage '{stage}' failed: {source}")]
    StageFatal {
        /// Name of the failing stage.
        stage: String,
        /// The error that failed the stage.
        #[source]
        source: Box<ForgeError>,
    },

    /// Partition arguments are out of range.
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// The stage list violates its declared dependencies.
    #[error("Invalid stage order: {0}")]
    InvalidStageOrder(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ForgeError {
    /// Wrap an error as the failure of `stage`.
    ///
    /// Errors that already name a stage are returned unchanged.
    #[must_use]
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            already @ ForgeError::StageFatal { .. } => already,
            other => ForgeError::StageFatal {
                stage: stage.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the failing stage, if this is a stage failure.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            ForgeError::StageFatal { stage, .. } => Some(stage),
            ForgeError::Precondition { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Chunk indices that had not completed, for chunked stage failures.
    #[must_use]
    pub fn incomplete_chunks(&self) -> &[u32] {
        match self {
            ForgeError::ChunkFatal { incomplete, .. } => incomplete,
            ForgeError::StageFatal { source, .. } => source.incomplete_chunks(),
            _ => &[],
        }
    }

    /// Whether this error may be absorbed as a skipped record.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::TransientRecord { .. })
    }
}

impl From<std::io::Error> for ForgeError {
    fn from(e: std::io::Error) -> Self {
        ForgeError::Io(e.to_string())
    }
}

impl From<csv::Error> for ForgeError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            ForgeError::Io(e.to_string())
        } else {
            ForgeError::Serialization(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            ForgeError::Io(e.to_string())
        } else {
            ForgeError::Serialization(e.to_string())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn tally_saturates() {
        let mut tally = RecordTally::new(u64::MAX, 0);
        tally.record();
        assert_eq!(tally.records, u64::MAX);
        assert_eq!(tally.seen(), u64::MAX);
    }

    #[test]
    fn tally_merge() {
        let a = RecordTally::new(3, 1);
        let b = RecordTally::new(4, 2);
        assert_eq!(a.merge(b), RecordTally::new(7, 3));
    }

    #[test]
    fn in_stage_does_not_double_wrap() {
        let err = ForgeError::Io("disk full".into()).in_stage("convert_tables");
        let again = err.in_stage("other");
        assert_eq!(again.failed_stage(), Some("convert_tables"));
    }

    #[test]
    fn incomplete_chunks_surface_through_stage_failure() {
        let err = ForgeError::ChunkFatal {
            chunk: 2,
            reason: "boom".into(),
            incomplete: vec![2, 3, 4],
        }
        .in_stage("parse_wikitext");

        assert_eq!(err.incomplete_chunks(), &[2, 3, 4]);
        let message = err.to_string();
        assert!(message.contains("parse_wikitext"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn transient_classification() {
        let transient = ForgeError::TransientRecord {
            line: 7,
            reason: "bad json".into(),
        };
        assert!(transient.is_transient());
        assert!(!ForgeError::Io("x".into()).is_transient());
    }
}
