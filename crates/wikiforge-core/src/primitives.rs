//! # Innate Primitives
//!
//! Hardcoded constants for the wikiforge engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Configuration may override the defaults listed here; everything else is fixed.

// =============================================================================
// CONFIGURATION DEFAULTS
// =============================================================================

/// Default root directory for raw and derived artifacts.
pub const DEFAULT_DATA_PATH: &str = "data";

/// Default wiki id. The language code is this id without its `wiki` suffix.
pub const DEFAULT_WIKI: &str = "enwiki";

/// Default dump mirror.
///
/// The bundled fetcher only accepts local mirrors, so this default must be
/// overridden unless a custom `DumpFetcher` is installed.
pub const DEFAULT_MIRROR_URL: &str = "https://dumps.wikimedia.org";

/// Default download job list, in download order.
pub const DEFAULT_DOWNLOAD_JOBS: &str =
    "articlesdump,pagetable,pagepropstable,redirecttable,pageviewcomplete,wikidatajson";

/// Default skip tolerance: 1% of records in a chunk may be malformed.
pub const DEFAULT_SKIP_TOLERANCE_PPM: u32 = 10_000;

/// One million; the denominator of every tolerance ratio.
pub const PPM: u32 = 1_000_000;

// =============================================================================
// PARTITIONING
// =============================================================================

/// Number of Wikidata entities written to each split chunk.
pub const WIKIDATA_CHUNK_SIZE: u64 = 500_000;

// =============================================================================
// WIKI CONVENTIONS
// =============================================================================

/// Article namespace. Every other namespace is filtered out.
pub const ARTICLE_NAMESPACE: i64 = 0;

/// Root classes whose P279 subclass closures become `isa_Q{n}` columns.
///
/// In order: Wikimedia internal item, point in time with respect to a
/// recurrent timeframe, events in a specific period, human, geographic
/// location, organization, business.
pub const ROOT_QIDS: [u64; 7] = [17_442_446, 14_795_564, 18_340_514, 5, 2_221_906, 43_229, 4_830_453];

/// Link target prefixes that never name an article (compared lowercase).
pub const FORBIDDEN_LINK_PREFIXES: [&str; 3] = ["category", "file", "image"];

/// Page properties kept by the table converter.
pub const PAGE_PROP_NAMES: [&str; 2] = ["wikibase_item", "wikibase-shortdesc"];

/// Item id written when a page has no usable Wikidata item.
pub const MISSING_ITEM_ID: i64 = -1;

/// Templates turned into boolean flag columns.
pub const FLAG_TEMPLATES: [&str; 4] = [
    "good_article",
    "featured_article",
    "pseudoscience",
    "conspiracy_theories",
];

/// Name of the section that precedes the first heading.
pub const INTRO_SECTION_NAME: &str = "Introduction";

// =============================================================================
// ARTIFACT LAYOUT
// =============================================================================

/// File name of the manifest written into every chunk directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// File name of the chunk plan, recorded before any chunk is written.
pub const PLAN_FILE_NAME: &str = "plan.json";

/// Suffix for in-progress writes. Files ending in it are never artifacts.
pub const TMP_SUFFIX: &str = ".tmp";

/// Width of the zero-padded chunk index in chunk file names.
pub const CHUNK_INDEX_WIDTH: usize = 4;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_qids_are_unique() {
        let mut sorted = ROOT_QIDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ROOT_QIDS.len());
    }

    #[test]
    fn tolerance_default_within_range() {
        assert!(DEFAULT_SKIP_TOLERANCE_PPM <= PPM);
    }

    #[test]
    fn forbidden_prefixes_are_lowercase() {
        for prefix in FORBIDDEN_LINK_PREFIXES {
            assert_eq!(prefix, prefix.to_lowercase());
        }
    }
}
