//! Every artifact the standard pipeline reads or writes.
//!
//! Chunked keys carry a `_CHUNKS` suffix; their gathered counterpart (same
//! name, single file) is the plain constant where one exists.

use crate::artifact::{ArtifactKey, Corpus, Format};
use crate::config::DownloadJob;

const fn wp_raw(name: &'static str, format: Format) -> ArtifactKey {
    ArtifactKey::raw(Corpus::Wikipedia, name, format)
}

const fn wp(name: &'static str, format: Format) -> ArtifactKey {
    ArtifactKey::derived(Corpus::Wikipedia, name, format)
}

const fn wd(name: &'static str) -> ArtifactKey {
    ArtifactKey::derived(Corpus::Wikidata, name, Format::Csv)
}

// =============================================================================
// RAW LAYER
// =============================================================================

pub const ARTICLES_DUMP: ArtifactKey = wp_raw("pages-articles", Format::Jsonl).chunks();
pub const PAGE_TABLE: ArtifactKey = wp_raw("page", Format::Csv);
pub const PAGE_PROPS_TABLE: ArtifactKey = wp_raw("page_props", Format::Csv);
pub const REDIRECT_TABLE: ArtifactKey = wp_raw("redirect", Format::Csv);
pub const PAGEVIEWS_DUMP: ArtifactKey = wp_raw("pageviews", Format::Text).chunks();
pub const WIKIDATA_DUMP: ArtifactKey = ArtifactKey::raw(Corpus::Wikidata, "all", Format::Json);

/// Raw artifact a download job fills.
#[must_use]
pub const fn raw_key(job: DownloadJob) -> ArtifactKey {
    match job {
        DownloadJob::ArticlesDump => ARTICLES_DUMP,
        DownloadJob::PageTable => PAGE_TABLE,
        DownloadJob::PagePropsTable => PAGE_PROPS_TABLE,
        DownloadJob::RedirectTable => REDIRECT_TABLE,
        DownloadJob::PageviewComplete => PAGEVIEWS_DUMP,
        DownloadJob::WikidataJson => WIKIDATA_DUMP,
    }
}

// =============================================================================
// WIKIPEDIA DERIVED
// =============================================================================

pub const PAGEVIEWS: ArtifactKey = wp("prior-month-pageviews", Format::Csv);
pub const PAGE: ArtifactKey = wp("page", Format::Csv);
pub const REDIRECT: ArtifactKey = wp("redirect", Format::Csv);
pub const PAGE_PROPS_FILTERED: ArtifactKey = wp("page_props", Format::Csv);
pub const PAGE_PROPS: ArtifactKey = wp("page-props", Format::Csv);
pub const REDIRECT_EDGES: ArtifactKey = wp("redirect-edges", Format::Csv);
pub const ULTIMATE_REDIRECT: ArtifactKey = wp("ultimate-redirect", Format::Csv);
pub const TITLE_MAPPER: ArtifactKey = wp("title-mapper", Format::Csv);
pub const ARTICLE_PRE: ArtifactKey = wp("article-pre", Format::Csv);

pub const LINK_ANNOTATED_TEXT_CHUNKS: ArtifactKey = wp("link-annotated-text", Format::Jsonl).chunks();
pub const LINKS: ArtifactKey = wp("links", Format::Csv);
pub const LINKS_CHUNKS: ArtifactKey = LINKS.chunks();
pub const PARAGRAPHS_CHUNKS: ArtifactKey = wp("paragraphs", Format::Csv).chunks();
pub const SECTION_NAMES: ArtifactKey = wp("section-names", Format::Csv);
pub const SECTION_NAMES_CHUNKS: ArtifactKey = SECTION_NAMES.chunks();
pub const TEMPLATES: ArtifactKey = wp("templates", Format::Csv);
pub const TEMPLATES_CHUNKS: ArtifactKey = TEMPLATES.chunks();
pub const LENGTHS: ArtifactKey = wp("lengths", Format::Csv);
pub const LENGTHS_CHUNKS: ArtifactKey = LENGTHS.chunks();

pub const ANCHOR_TARGET_COUNTS: ArtifactKey = wp("anchor-target-counts", Format::Csv);
pub const ANCHOR_TARGET_COUNTS_CHUNKS: ArtifactKey = ANCHOR_TARGET_COUNTS.chunks();
pub const IN_OUT_COUNTS: ArtifactKey = wp("in-out-counts", Format::Csv);
pub const IN_OUT_COUNTS_CHUNKS: ArtifactKey = IN_OUT_COUNTS.chunks();
pub const LINKS_EDGES_PLUS: ArtifactKey = wp("links-edges-plus", Format::Csv);
pub const LINKS_EDGES: ArtifactKey = wp("links-edges", Format::Csv);

pub const ARTICLE: ArtifactKey = wp("article", Format::Csv);

// =============================================================================
// WIKIDATA DERIVED
// =============================================================================

pub const WIKIDATA_CHUNKS: ArtifactKey = ArtifactKey::derived(Corpus::Wikidata, "wikidata", Format::Jsonl).chunks();

pub const ITEM: ArtifactKey = wd("item");
pub const ITEM_ALIAS: ArtifactKey = wd("item-alias");
pub const PROPERTY: ArtifactKey = wd("property");
pub const PROPERTY_ALIAS: ArtifactKey = wd("property-alias");
pub const P31_CLAIM: ArtifactKey = wd("p31-claim");
pub const P279_CLAIM: ArtifactKey = wd("p279-claim");
pub const QPQ_CLAIM: ArtifactKey = wd("qpq-claim");
pub const ITEM_STATEMENTS: ArtifactKey = wd("item-statements");
pub const SKIPPED_ENTITY: ArtifactKey = wd("skipped-entity");

/// The tables `filter_wikidata` writes per chunk, in output-slot order.
pub const WIKIDATA_TABLES: [ArtifactKey; 9] = [
    ITEM,
    ITEM_ALIAS,
    PROPERTY,
    PROPERTY_ALIAS,
    P31_CLAIM,
    P279_CLAIM,
    QPQ_CLAIM,
    ITEM_STATEMENTS,
    SKIPPED_ENTITY,
];
