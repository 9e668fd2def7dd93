//! # Pipeline Stages
//!
//! The concrete transformations, in execution order:
//!
//! | # | Stage | Kind | Writes |
//! |---|-------|------|--------|
//! | 1 | `download_raw_dumps` | sequential | raw layer |
//! | 2 | `create_pageviews` | sequential | `prior-month-pageviews` |
//! | 3 | `convert_tables` | sequential | `page`, `redirect`, `page_props` |
//! | 4 | `create_page_props` | sequential | `page-props` |
//! | 5 | `create_redirect_edges` | sequential | `redirect-edges` |
//! | 6 | `create_ultimate_redirect` | sequential | `ultimate-redirect` |
//! | 7 | `create_title_mapper` | sequential | `title-mapper` |
//! | 8 | `split_wikidata` | sequential | `wikidata-chunks` |
//! | 9 | `filter_wikidata` | chunked | nine wikidata tables, per chunk |
//! | 10 | `gather_wikidata` | sequential | nine wikidata tables |
//! | 11 | `create_article_pre` | sequential | `article-pre` |
//! | 12 | `parse_wikitext` | chunked | text, links, paragraphs, sections, stats |
//! | 13 | `post_process_links` | chunked | anchor counts, in/out counts |
//! | 14 | `collect_links` | sequential | gathered link tables |
//! | 15 | `collect_templates` | sequential | `templates` |
//! | 16 | `collect_lengths` | sequential | `lengths` |
//! | 17 | `create_article` | sequential | `article` |
//! | 18 | `collect_section_names` | sequential | `section-names` |
//!
//! Chunked stages record their plan before fan-out and persist one manifest
//! per chunked output key once every chunk has completed.

mod article;
mod download;
mod gather;
pub mod keys;
mod links;
mod pageviews;
pub mod records;
mod redirects;
mod tables;
mod wikidata;
mod wikitext;

pub use article::{CreateArticle, CreateArticlePre};
pub use download::DownloadRawDumps;
pub use gather::GatherChunks;
pub use links::{CollectLinks, PostProcessLinks};
pub use pageviews::CreatePageviews;
pub use redirects::{CreateRedirectEdges, CreateTitleMapper, CreateUltimateRedirect};
pub use tables::{ConvertTables, CreatePageProps};
pub use wikidata::{FilterWikidata, GatherWikidata, SplitWikidata};
pub use wikitext::ParseWikitext;

use crate::artifact::ArtifactKey;
use crate::facet::StatsCollector;
use crate::formats::{TableWriter, concat_tables};
use crate::partition::ChunkManifest;
use crate::system::{Stage, StageContext};
use crate::types::ForgeError;
use records::Row;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The standard stage list, in dependency order.
#[must_use]
pub fn standard_pipeline() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(DownloadRawDumps),
        Box::new(CreatePageviews),
        Box::new(ConvertTables),
        Box::new(CreatePageProps),
        Box::new(CreateRedirectEdges),
        Box::new(CreateUltimateRedirect),
        Box::new(CreateTitleMapper),
        Box::new(SplitWikidata),
        Box::new(FilterWikidata),
        Box::new(GatherWikidata),
        Box::new(CreateArticlePre),
        Box::new(ParseWikitext),
        Box::new(PostProcessLinks),
        Box::new(CollectLinks),
        Box::new(GatherChunks::templates()),
        Box::new(GatherChunks::lengths()),
        Box::new(CreateArticle),
        Box::new(GatherChunks::section_names()),
    ]
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Write `rows` as a complete table.
fn write_table<T, I>(dest: &Path, rows: I) -> Result<u64, ForgeError>
where
    T: Row + Serialize,
    I: IntoIterator<Item = T>,
{
    let mut table = TableWriter::create(dest, T::COLUMNS)?;
    for row in rows {
        table.write_row(&row)?;
    }
    table.commit()
}

/// Paths chunk `index` writes, one per key.
fn chunk_outputs(ctx: &StageContext<'_>, keys: &[ArtifactKey], index: u32) -> Vec<PathBuf> {
    keys.iter().map(|key| ctx.locate(key, Some(index))).collect()
}

/// Discard chunk files written under a different plan, then record `manifest`
/// as the plan of `key`. Must run before any chunk of `manifest` is written.
fn plan_chunks(ctx: &StageContext<'_>, key: &ArtifactKey, manifest: &ChunkManifest) -> Result<(), ForgeError> {
    let previous = ctx.store.read_plan(ctx.snapshot(), key);
    let retired = manifest.retire_stale(previous.as_ref())?;
    if !retired.is_empty() {
        tracing::info!(artifact = %key, retired = ?retired, "discarded chunks from a different plan");
    }
    ctx.store.write_plan(ctx.snapshot(), key, manifest)
}

/// Mark each chunked key present by persisting its projection of `manifest`.
fn persist_manifests(
    ctx: &StageContext<'_>,
    keys: &[ArtifactKey],
    manifest: &ChunkManifest,
) -> Result<(), ForgeError> {
    for (slot, key) in keys.iter().enumerate() {
        ctx.store.write_manifest(ctx.snapshot(), key, &manifest.for_slot(slot))?;
    }
    Ok(())
}

/// Concatenate the chunks of `chunked` into its gathered artifact.
fn gather(ctx: &StageContext<'_>, chunked: &ArtifactKey, columns: &[&str]) -> Result<u64, ForgeError> {
    let manifest = ctx.store.read_manifest(ctx.snapshot(), chunked)?;
    let rows = concat_tables(
        &manifest.outputs_at(0),
        &ctx.locate(&chunked.gathered(), None),
        columns,
    )?;
    tracing::debug!(artifact = %chunked.gathered(), chunks = manifest.len(), rows, "gathered");
    Ok(rows)
}

/// Header of a statistics table: `page_id` then the collector's columns.
fn stats_header(collector: &dyn StatsCollector) -> Vec<&'static str> {
    let mut columns = vec!["page_id"];
    columns.extend(collector.columns());
    columns
}

/// Numeric part of an entity id such as `Q42` or `P31`.
fn entity_number(id: &str, prefix: char) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}
