//! # Facets
//!
//! Collaborators the engine depends on only through traits:
//!
//! | Trait | Job | Default |
//! |-------|-----|---------|
//! | [`DumpFetcher`] | locate a download job's files | [`MirrorDirFetcher`] |
//! | [`MarkupParser`] | turn article markup into paragraphs and links | [`LightMarkupParser`] |
//! | [`StatsCollector`] | per-article statistics | [`TemplateCollector`], [`LengthCollector`] |
//!
//! Facets hold no run state. Every implementation must be `Send + Sync`
//! because chunk transforms call them from pool threads.

mod collect;
mod markup;
mod mirror;

pub use collect::{CountsRecord, LengthCollector, StatsCollector, TemplateCollector};
pub use markup::{
    LightMarkupParser, MarkupParser, Paragraph, StructuredDocument, WikiLink, normalize_title,
};
pub use mirror::{DumpFetcher, FetchRequest, MirrorDirFetcher};

/// The collaborator set a pipeline runs with.
pub struct Facets {
    pub fetcher: Box<dyn DumpFetcher>,
    pub parser: Box<dyn MarkupParser>,
    pub templates: Box<dyn StatsCollector>,
    pub lengths: Box<dyn StatsCollector>,
}

impl Default for Facets {
    fn default() -> Self {
        Self {
            fetcher: Box::new(MirrorDirFetcher),
            parser: Box::new(LightMarkupParser),
            templates: Box::new(TemplateCollector),
            lengths: Box::new(LengthCollector),
        }
    }
}

impl std::fmt::Debug for Facets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facets")
            .field("templates", &self.templates.columns())
            .field("lengths", &self.lengths.columns())
            .finish_non_exhaustive()
    }
}
