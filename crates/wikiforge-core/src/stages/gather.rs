//! Gathering of per-chunk tables that need no further aggregation.

use super::keys::{LENGTHS_CHUNKS, SECTION_NAMES_CHUNKS, TEMPLATES_CHUNKS};
use super::records::{Row, SectionNameRow};
use super::{gather, stats_header};
use crate::artifact::ArtifactKey;
use crate::facet::Facets;
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};

/// Concatenates the chunks of one chunked key into its gathered artifact.
#[derive(Debug, Clone, Copy)]
pub struct GatherChunks {
    name: &'static str,
    chunked: ArtifactKey,
    columns: fn(&Facets) -> Vec<&'static str>,
}

impl GatherChunks {
    /// `collect_templates`: the template-flag table.
    #[must_use]
    pub fn templates() -> Self {
        Self {
            name: "collect_templates",
            chunked: TEMPLATES_CHUNKS,
            columns: |facets| stats_header(facets.templates.as_ref()),
        }
    }

    /// `collect_lengths`: the article-length table.
    #[must_use]
    pub fn lengths() -> Self {
        Self {
            name: "collect_lengths",
            chunked: LENGTHS_CHUNKS,
            columns: |facets| stats_header(facets.lengths.as_ref()),
        }
    }

    /// `collect_section_names`: per-page section names.
    #[must_use]
    pub fn section_names() -> Self {
        Self {
            name: "collect_section_names",
            chunked: SECTION_NAMES_CHUNKS,
            columns: |_| SectionNameRow::COLUMNS.to_vec(),
        }
    }
}

impl Stage for GatherChunks {
    fn name(&self) -> &'static str {
        self.name
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![self.chunked]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![self.chunked.gathered()]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let columns = (self.columns)(ctx.facets);
        let rows = gather(ctx, &self.chunked, &columns)?;
        tracing::info!(artifact = %self.chunked.gathered(), rows, "chunks gathered");
        Ok(StageReport::from_tally(RecordTally::new(rows, 0)))
    }
}
