//! Per-article statistics.

use super::markup::StructuredDocument;
use crate::primitives::FLAG_TEMPLATES;

/// One article's statistics, in the collector's column order.
pub type CountsRecord = Vec<u64>;

/// Derives a fixed set of integer columns from a parsed article.
pub trait StatsCollector: Send + Sync {
    /// Column names, excluding `page_id`.
    fn columns(&self) -> Vec<&'static str>;

    /// One value per column.
    fn collect(&self, doc: &StructuredDocument) -> CountsRecord;
}

/// Flags (0/1) for the maintenance templates in [`FLAG_TEMPLATES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCollector;

impl StatsCollector for TemplateCollector {
    fn columns(&self) -> Vec<&'static str> {
        FLAG_TEMPLATES.to_vec()
    }

    fn collect(&self, doc: &StructuredDocument) -> CountsRecord {
        FLAG_TEMPLATES
            .iter()
            .map(|flag| {
                let wanted = flag.replace('_', " ");
                u64::from(doc.templates.iter().any(|name| *name == wanted))
            })
            .collect()
    }
}

/// Article and introduction length in characters.
///
/// The introduction is the first paragraph.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthCollector;

impl StatsCollector for LengthCollector {
    fn columns(&self) -> Vec<&'static str> {
        vec!["len_article_chars", "len_intro_chars"]
    }

    fn collect(&self, doc: &StructuredDocument) -> CountsRecord {
        let lengths: Vec<u64> = doc
            .paragraphs
            .iter()
            .map(|p| p.plaintext.chars().count() as u64)
            .collect();
        vec![lengths.iter().sum(), lengths.first().copied().unwrap_or(0)]
    }
}
