//! Row types of the tabular artifacts.
//!
//! Each type lists its header in [`Row::COLUMNS`]; field order matches the
//! header so rows serialize positionally.

use crate::redirect::RedirectKind;
use serde::{Deserialize, Serialize};

/// A row type with a fixed header.
pub trait Row {
    const COLUMNS: &'static [&'static str];
}

macro_rules! row {
    ($ty:ident, [$($col:literal),+ $(,)?]) => {
        impl Row for $ty {
            const COLUMNS: &'static [&'static str] = &[$($col),+];
        }
    };
}

// =============================================================================
// RAW TABLES
// =============================================================================

/// A `page` table row as dumped. Flags are 0/1.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPageRow {
    pub page_id: i64,
    pub page_namespace: i64,
    pub page_title: String,
    pub page_is_redirect: u8,
    pub page_len: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRedirectRow {
    pub rd_from: i64,
    pub rd_namespace: i64,
    pub rd_title: String,
}

/// A `page_props` row, raw or filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePropRow {
    pub pp_page: i64,
    pub pp_propname: String,
    pub pp_value: String,
}
row!(PagePropRow, ["pp_page", "pp_propname", "pp_value"]);

/// One article as stored in the raw articles dump.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    pub page_id: i64,
    pub title: String,
    #[serde(default)]
    pub namespace: i64,
    #[serde(default)]
    pub is_redirect: bool,
    #[serde(default)]
    pub text: String,
}

// =============================================================================
// PAGE METADATA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRow {
    pub page_id: i64,
    pub page_title: String,
    pub page_is_redirect: bool,
    pub page_len: i64,
}
row!(PageRow, ["page_id", "page_title", "page_is_redirect", "page_len"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRow {
    pub rd_from: i64,
    pub rd_title: String,
}
row!(RedirectRow, ["rd_from", "rd_title"]);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePropsRow {
    pub page_id: i64,
    pub wikibase_item: String,
    pub wikibase_shortdesc: String,
}
row!(PagePropsRow, ["page_id", "wikibase_item", "wikibase_shortdesc"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageviewRow {
    pub page_title: String,
    pub views: u64,
}
row!(PageviewRow, ["page_title", "views"]);

// =============================================================================
// REDIRECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEdgeRow {
    pub source_id: i64,
    pub source_title: String,
    pub target_id: i64,
    pub target_title: String,
}
row!(RedirectEdgeRow, ["source_id", "source_title", "target_id", "target_title"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UltimateRedirectRow {
    pub source_id: i64,
    pub source_title: String,
    pub target_id: i64,
    pub target_title: String,
    pub hops: u32,
    pub kind: RedirectKind,
}
row!(UltimateRedirectRow, ["source_id", "source_title", "target_id", "target_title", "hops", "kind"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleMapperRow {
    pub source_id: i64,
    pub source_title: String,
    pub target_id: i64,
    pub target_title: String,
    pub is_redirect: bool,
}
row!(TitleMapperRow, ["source_id", "source_title", "target_id", "target_title", "is_redirect"]);

// =============================================================================
// WIKIDATA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub item_id: u64,
    pub label: String,
    pub description: String,
}
row!(ItemRow, ["item_id", "label", "description"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAliasRow {
    pub item_id: u64,
    pub alias: String,
}
row!(ItemAliasRow, ["item_id", "alias"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub property_id: u64,
    pub label: String,
    pub description: String,
}
row!(PropertyRow, ["property_id", "label", "description"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAliasRow {
    pub property_id: u64,
    pub alias: String,
}
row!(PropertyAliasRow, ["property_id", "alias"]);

/// `instance of` / `subclass of` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub source_id: u64,
    pub target_id: u64,
}
row!(ClaimRow, ["source_id", "target_id"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QpqClaimRow {
    pub source_id: u64,
    pub property_id: u64,
    pub target_id: u64,
    pub qualifier_property_id: u64,
    pub qualifier_target_id: u64,
}
row!(
    QpqClaimRow,
    ["source_id", "property_id", "target_id", "qualifier_property_id", "qualifier_target_id"]
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatementRow {
    pub source_id: u64,
    pub property_id: u64,
    pub target_id: u64,
}
row!(ItemStatementRow, ["source_id", "property_id", "target_id"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntityRow {
    pub entity_id: String,
    pub entity_type: String,
}
row!(SkippedEntityRow, ["entity_id", "entity_type"]);

// =============================================================================
// ARTICLE TEXT & LINKS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    pub source_page_id: i64,
    pub section_idx: u32,
    pub paragraph_idx: u32,
    pub anchor_text: String,
    pub anchor_start: u32,
    pub target_page_id: i64,
}
row!(
    LinkRow,
    ["source_page_id", "section_idx", "paragraph_idx", "anchor_text", "anchor_start", "target_page_id"]
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphRow {
    pub page_id: i64,
    pub section_idx: u32,
    pub paragraph_idx: u32,
    pub plaintext: String,
}
row!(ParagraphRow, ["page_id", "section_idx", "paragraph_idx", "plaintext"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNameRow {
    pub page_id: i64,
    pub section_idx: u32,
    pub section_name: String,
}
row!(SectionNameRow, ["page_id", "section_idx", "section_name"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorTargetCountRow {
    pub anchor_text: String,
    pub target_page_id: i64,
    pub count: u64,
}
row!(AnchorTargetCountRow, ["anchor_text", "target_page_id", "count"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InOutCountRow {
    pub page_id: i64,
    pub in_count: u64,
    pub out_count: u64,
}
row!(InOutCountRow, ["page_id", "in_count", "out_count"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePlusRow {
    pub source_page_id: i64,
    pub section_idx: u32,
    pub paragraph_idx: u32,
    pub target_page_id: i64,
}
row!(EdgePlusRow, ["source_page_id", "section_idx", "paragraph_idx", "target_page_id"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source_page_id: i64,
    pub target_page_id: i64,
}
row!(EdgeRow, ["source_page_id", "target_page_id"]);

/// One line of `link-annotated-text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedPage {
    pub page_id: i64,
    pub page_title: String,
    pub paragraphs: Vec<AnnotatedParagraph>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedParagraph {
    pub section_idx: u32,
    pub section_name: String,
    pub plaintext: String,
    pub links: Vec<AnnotatedLink>,
}

/// A link whose target resolved to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedLink {
    pub target_page_id: i64,
    pub anchor: String,
    pub start: u32,
    pub end: u32,
}
