//! Article parsing.
//!
//! One chunk per raw article file. Each kept page (article namespace, not a
//! redirect, non-empty text) is parsed by the configured [`MarkupParser`],
//! its links are resolved through the title mapper and six per-chunk
//! artifacts are written. Links whose target has no mapping are dropped.
//!
//! [`MarkupParser`]: crate::facet::MarkupParser

use super::keys::{
    ARTICLES_DUMP, LENGTHS_CHUNKS, LINK_ANNOTATED_TEXT_CHUNKS, LINKS_CHUNKS, PARAGRAPHS_CHUNKS,
    SECTION_NAMES_CHUNKS, TEMPLATES_CHUNKS, TITLE_MAPPER,
};
use super::records::{
    AnnotatedLink, AnnotatedPage, AnnotatedParagraph, LinkRow, ParagraphRow, RawPage, Row, SectionNameRow,
    TitleMapperRow,
};
use super::{chunk_outputs, persist_manifests, plan_chunks, stats_header};
use crate::artifact::ArtifactKey;
use crate::facet::{Facets, StructuredDocument};
use crate::formats::{JsonlWriter, TableWriter, read_rows, visit_lines};
use crate::partition::{ChunkDescriptor, ChunkManifest};
use crate::pool::ChunkStats;
use crate::primitives::ARTICLE_NAMESPACE;
use crate::system::{Stage, StageContext, StageReport};
use crate::types::ForgeError;
use std::collections::BTreeMap;
use std::path::Path;

const OUTPUTS: [ArtifactKey; 6] = [
    LINK_ANNOTATED_TEXT_CHUNKS,
    LINKS_CHUNKS,
    PARAGRAPHS_CHUNKS,
    SECTION_NAMES_CHUNKS,
    TEMPLATES_CHUNKS,
    LENGTHS_CHUNKS,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseWikitext;

impl Stage for ParseWikitext {
    fn name(&self) -> &'static str {
        "parse_wikitext"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![ARTICLES_DUMP, TITLE_MAPPER]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        OUTPUTS.to_vec()
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let mapper = read_rows::<TitleMapperRow>(&ctx.locate(&TITLE_MAPPER, None))?;
        ctx.check_tolerance(mapper.tally)?;
        let titles: BTreeMap<String, i64> = mapper
            .rows
            .into_iter()
            .map(|row| (row.source_title, row.target_id))
            .collect();

        let dump = ctx.store.read_manifest(ctx.snapshot(), &ARTICLES_DUMP)?;
        let manifest = ChunkManifest::for_inputs(&dump.outputs_at(0), ctx.config.max_entities, |index| {
            chunk_outputs(ctx, &OUTPUTS, index)
        });
        tracing::info!(titles = titles.len(), chunks = manifest.len(), "parsing articles");
        plan_chunks(ctx, &OUTPUTS[0], &manifest)?;

        let report = ctx
            .pool
            .run(self.name(), &manifest, |chunk| parse_chunk(chunk, &titles, ctx.facets))?;
        persist_manifests(ctx, &OUTPUTS, &manifest)?;
        Ok(StageReport::from_pool(&report))
    }
}

struct ChunkWriters {
    annotated: JsonlWriter,
    links: TableWriter,
    paragraphs: TableWriter,
    sections: TableWriter,
    templates: TableWriter,
    lengths: TableWriter,
}

impl ChunkWriters {
    fn create(chunk: &ChunkDescriptor, facets: &Facets) -> Result<Self, ForgeError> {
        Ok(Self {
            annotated: JsonlWriter::create(chunk.output(0)?)?,
            links: TableWriter::create(chunk.output(1)?, LinkRow::COLUMNS)?,
            paragraphs: TableWriter::create(chunk.output(2)?, ParagraphRow::COLUMNS)?,
            sections: TableWriter::create(chunk.output(3)?, SectionNameRow::COLUMNS)?,
            templates: TableWriter::create(chunk.output(4)?, &stats_header(facets.templates.as_ref()))?,
            lengths: TableWriter::create(chunk.output(5)?, &stats_header(facets.lengths.as_ref()))?,
        })
    }

    fn commit(self) -> Result<(), ForgeError> {
        self.annotated.commit()?;
        for table in [self.links, self.paragraphs, self.sections, self.templates, self.lengths] {
            table.commit()?;
        }
        Ok(())
    }
}

fn parse_chunk(
    chunk: &ChunkDescriptor,
    titles: &BTreeMap<String, i64>,
    facets: &Facets,
) -> Result<ChunkStats, ForgeError> {
    let input = chunk
        .input
        .as_deref()
        .ok_or_else(|| ForgeError::InvalidPartition(format!("chunk {} has no input", chunk.index)))?;
    let mut out = ChunkWriters::create(chunk, facets)?;
    let mut stats = ChunkStats::default();

    visit_pages(input, chunk, &mut stats, |page| {
        let doc = facets.parser.parse(&page.text);
        write_page(&page, &doc, titles, facets, &mut out)
    })?;

    out.commit()?;
    Ok(stats)
}

/// Call `handle` for every kept page until the chunk's budget is spent.
fn visit_pages<F>(input: &Path, chunk: &ChunkDescriptor, stats: &mut ChunkStats, mut handle: F) -> Result<(), ForgeError>
where
    F: FnMut(RawPage) -> Result<(), ForgeError>,
{
    visit_lines(input, |line_no, line| {
        if chunk.budget.is_some_and(|budget| stats.records >= budget) {
            return Ok(false);
        }
        if line.trim().is_empty() {
            return Ok(true);
        }
        match serde_json::from_str::<RawPage>(line) {
            Ok(page) => {
                if page.namespace == ARTICLE_NAMESPACE && !page.is_redirect && !page.text.trim().is_empty() {
                    handle(page)?;
                    stats.record();
                }
            }
            Err(e) => {
                let skipped = ForgeError::TransientRecord {
                    line: line_no,
                    reason: e.to_string(),
                };
                tracing::debug!(chunk = chunk.index, error = %skipped, "skipping page");
                stats.skip();
            }
        }
        Ok(true)
    })
}

fn write_page(
    page: &RawPage,
    doc: &StructuredDocument,
    titles: &BTreeMap<String, i64>,
    facets: &Facets,
    out: &mut ChunkWriters,
) -> Result<(), ForgeError> {
    let mut annotated = Vec::with_capacity(doc.paragraphs.len());
    let mut sections: BTreeMap<u32, &str> = BTreeMap::new();

    for (paragraph_idx, paragraph) in doc.paragraphs.iter().enumerate() {
        let paragraph_idx = paragraph_idx as u32;
        sections
            .entry(paragraph.section_idx)
            .or_insert(paragraph.section_name.as_str());
        out.paragraphs.write_row(&ParagraphRow {
            page_id: page.page_id,
            section_idx: paragraph.section_idx,
            paragraph_idx,
            plaintext: paragraph.plaintext.clone(),
        })?;

        let mut links = Vec::new();
        for link in &paragraph.wikilinks {
            let Some(&target_page_id) = titles.get(&link.target) else {
                continue;
            };
            out.links.write_row(&LinkRow {
                source_page_id: page.page_id,
                section_idx: paragraph.section_idx,
                paragraph_idx,
                anchor_text: link.anchor.to_lowercase(),
                anchor_start: link.start,
                target_page_id,
            })?;
            links.push(AnnotatedLink {
                target_page_id,
                anchor: link.anchor.clone(),
                start: link.start,
                end: link.end,
            });
        }
        annotated.push(AnnotatedParagraph {
            section_idx: paragraph.section_idx,
            section_name: paragraph.section_name.clone(),
            plaintext: paragraph.plaintext.clone(),
            links,
        });
    }

    for (section_idx, section_name) in sections {
        out.sections.write_row(&SectionNameRow {
            page_id: page.page_id,
            section_idx,
            section_name: section_name.to_string(),
        })?;
    }
    write_stats(&mut out.templates, page.page_id, facets.templates.collect(doc))?;
    write_stats(&mut out.lengths, page.page_id, facets.lengths.collect(doc))?;
    out.annotated.write(&AnnotatedPage {
        page_id: page.page_id,
        page_title: page.title.clone(),
        paragraphs: annotated,
    })
}

fn write_stats(table: &mut TableWriter, page_id: i64, values: Vec<u64>) -> Result<(), ForgeError> {
    let record: Vec<String> = std::iter::once(page_id.to_string())
        .chain(values.iter().map(u64::to_string))
        .collect();
    table.write_record(&record)
}
