//! Link statistics.

use super::keys::{
    ANCHOR_TARGET_COUNTS, ANCHOR_TARGET_COUNTS_CHUNKS, IN_OUT_COUNTS, IN_OUT_COUNTS_CHUNKS, LINKS, LINKS_CHUNKS,
    LINKS_EDGES, LINKS_EDGES_PLUS,
};
use super::records::{AnchorTargetCountRow, EdgePlusRow, EdgeRow, InOutCountRow, LinkRow, Row};
use super::{chunk_outputs, gather, persist_manifests, plan_chunks, write_table};
use crate::artifact::ArtifactKey;
use crate::formats::{TableWriter, read_rows, visit_rows};
use crate::partition::ChunkDescriptor;
use crate::pool::ChunkStats;
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use std::collections::{BTreeMap, BTreeSet};

/// Link counts keyed by `(anchor_text, target_page_id)`.
type AnchorCounts = BTreeMap<(String, i64), u64>;

/// `(in, out)` link counts keyed by page id.
type DegreeCounts = BTreeMap<i64, (u64, u64)>;

fn count_link(anchors: &mut AnchorCounts, degrees: &mut DegreeCounts, link: LinkRow) {
    let target = degrees.entry(link.target_page_id).or_default();
    target.0 = target.0.saturating_add(1);
    let source = degrees.entry(link.source_page_id).or_default();
    source.1 = source.1.saturating_add(1);
    let count = anchors.entry((link.anchor_text, link.target_page_id)).or_default();
    *count = count.saturating_add(1);
}

/// Rows ordered by count descending, then anchor, then target.
fn anchor_rows(anchors: AnchorCounts) -> Vec<AnchorTargetCountRow> {
    let mut rows: Vec<AnchorTargetCountRow> = anchors
        .into_iter()
        .map(|((anchor_text, target_page_id), count)| AnchorTargetCountRow {
            anchor_text,
            target_page_id,
            count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.anchor_text.cmp(&b.anchor_text))
            .then_with(|| a.target_page_id.cmp(&b.target_page_id))
    });
    rows
}

fn degree_rows(degrees: DegreeCounts) -> impl Iterator<Item = InOutCountRow> {
    degrees.into_iter().map(|(page_id, (in_count, out_count))| InOutCountRow {
        page_id,
        in_count,
        out_count,
    })
}

// =============================================================================
// PER-CHUNK COUNTS
// =============================================================================

const CHUNK_OUTPUTS: [ArtifactKey; 2] = [ANCHOR_TARGET_COUNTS_CHUNKS, IN_OUT_COUNTS_CHUNKS];

/// Counts anchors and link degrees within each link chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostProcessLinks;

impl Stage for PostProcessLinks {
    fn name(&self) -> &'static str {
        "post_process_links"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![LINKS_CHUNKS]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        CHUNK_OUTPUTS.to_vec()
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let links = ctx.store.read_manifest(ctx.snapshot(), &LINKS_CHUNKS)?;
        let manifest = links.follow_on(|index| chunk_outputs(ctx, &CHUNK_OUTPUTS, index));
        plan_chunks(ctx, &CHUNK_OUTPUTS[0], &manifest)?;
        let report = ctx.pool.run(self.name(), &manifest, count_chunk)?;
        persist_manifests(ctx, &CHUNK_OUTPUTS, &manifest)?;
        Ok(StageReport::from_pool(&report))
    }
}

fn count_chunk(chunk: &ChunkDescriptor) -> Result<ChunkStats, ForgeError> {
    let input = chunk
        .input
        .as_deref()
        .ok_or_else(|| ForgeError::InvalidPartition(format!("chunk {} has no input", chunk.index)))?;
    let mut anchors = AnchorCounts::new();
    let mut degrees = DegreeCounts::new();
    let stats = visit_rows(input, |link: LinkRow| {
        count_link(&mut anchors, &mut degrees, link);
        Ok(())
    })?;
    write_table(chunk.output(0)?, anchor_rows(anchors))?;
    write_table(chunk.output(1)?, degree_rows(degrees))?;
    Ok(stats)
}

// =============================================================================
// COLLECT
// =============================================================================

/// Gathers the link chunks and sums the per-chunk counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectLinks;

impl Stage for CollectLinks {
    fn name(&self) -> &'static str {
        "collect_links"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![LINKS_CHUNKS, ANCHOR_TARGET_COUNTS_CHUNKS, IN_OUT_COUNTS_CHUNKS]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![
            LINKS,
            LINKS_EDGES_PLUS,
            LINKS_EDGES,
            ANCHOR_TARGET_COUNTS,
            IN_OUT_COUNTS,
        ]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let links = gather(ctx, &LINKS_CHUNKS, LinkRow::COLUMNS)?;
        let mut tally = RecordTally::new(links, 0);

        tally = tally.merge(write_edges(ctx)?);

        let mut anchors = AnchorCounts::new();
        for path in ctx.store.read_manifest(ctx.snapshot(), &ANCHOR_TARGET_COUNTS_CHUNKS)?.outputs_at(0) {
            let read = visit_rows(&path, |row: AnchorTargetCountRow| {
                let count = anchors.entry((row.anchor_text, row.target_page_id)).or_default();
                *count = count.saturating_add(row.count);
                Ok(())
            })?;
            tally = tally.merge(read);
        }
        let anchor_count = write_table(&ctx.locate(&ANCHOR_TARGET_COUNTS, None), anchor_rows(anchors))?;

        let mut degrees = DegreeCounts::new();
        for path in ctx.store.read_manifest(ctx.snapshot(), &IN_OUT_COUNTS_CHUNKS)?.outputs_at(0) {
            let read = read_rows::<InOutCountRow>(&path)?;
            for row in read.rows {
                let entry = degrees.entry(row.page_id).or_default();
                entry.0 = entry.0.saturating_add(row.in_count);
                entry.1 = entry.1.saturating_add(row.out_count);
            }
            tally = tally.merge(read.tally);
        }
        let pages = write_table(&ctx.locate(&IN_OUT_COUNTS, None), degree_rows(degrees))?;

        ctx.check_tolerance(tally)?;
        tracing::info!(links, anchors = anchor_count, pages, "links collected");
        Ok(StageReport::from_tally(tally))
    }
}

/// Write `links-edges-plus` (every link, positioned) and `links-edges`
/// (distinct page pairs, sorted).
fn write_edges(ctx: &StageContext<'_>) -> Result<RecordTally, ForgeError> {
    let manifest = ctx.store.read_manifest(ctx.snapshot(), &LINKS_CHUNKS)?;
    let mut plus = TableWriter::create(&ctx.locate(&LINKS_EDGES_PLUS, None), EdgePlusRow::COLUMNS)?;
    let mut pairs: BTreeSet<EdgeRow> = BTreeSet::new();
    let mut tally = RecordTally::default();

    for path in manifest.outputs_at(0) {
        let read = visit_rows(&path, |link: LinkRow| {
            plus.write_row(&EdgePlusRow {
                source_page_id: link.source_page_id,
                section_idx: link.section_idx,
                paragraph_idx: link.paragraph_idx,
                target_page_id: link.target_page_id,
            })?;
            pairs.insert(EdgeRow {
                source_page_id: link.source_page_id,
                target_page_id: link.target_page_id,
            });
            Ok(())
        })?;
        tally = tally.merge(RecordTally::new(0, read.skipped));
    }
    plus.commit()?;
    write_table(&ctx.locate(&LINKS_EDGES, None), pairs)?;
    Ok(tally)
}
