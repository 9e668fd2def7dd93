//! Monthly pageview totals.
//!
//! Daily pageview files hold one whitespace-separated line per
//! `(project, title, user agent)`:
//!
//! ```text
//! en.wikipedia Anarchism 12 desktop 1534 A12B9
//! ```
//!
//! Field 5 is the day's total. Lines of other projects are ignored; lines
//! that are not six fields, or whose total is not a number, are skipped.

use super::keys::{PAGEVIEWS, PAGEVIEWS_DUMP};
use super::records::PageviewRow;
use super::write_table;
use crate::artifact::ArtifactKey;
use crate::formats::visit_lines;
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use std::collections::BTreeMap;

const FIELDS: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
pub struct CreatePageviews;

impl Stage for CreatePageviews {
    fn name(&self) -> &'static str {
        "create_pageviews"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![PAGEVIEWS_DUMP]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![PAGEVIEWS]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let project = format!("{}.wikipedia", ctx.snapshot().language());
        let manifest = ctx.store.read_manifest(ctx.snapshot(), &PAGEVIEWS_DUMP)?;

        let mut views: BTreeMap<String, u64> = BTreeMap::new();
        let mut tally = RecordTally::default();
        for file in manifest.outputs_at(0) {
            visit_lines(&file, |_, line| {
                match parse_line(line, &project) {
                    Line::Views(title, count) => {
                        let total = views.entry(title.to_string()).or_default();
                        *total = total.saturating_add(count);
                        tally.record();
                    }
                    Line::Ignored => {}
                    Line::Malformed => tally.skip(),
                }
                Ok(true)
            })?;
        }
        ctx.check_tolerance(tally)?;

        let titles = write_table(
            &ctx.locate(&PAGEVIEWS, None),
            views.into_iter().map(|(page_title, views)| PageviewRow { page_title, views }),
        )?;
        tracing::info!(titles, lines = tally.records, "pageviews summed");
        Ok(StageReport::from_tally(tally))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Views(&'a str, u64),
    Ignored,
    Malformed,
}

fn parse_line<'a>(line: &'a str, project: &str) -> Line<'a> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELDS {
        return if line.trim().is_empty() { Line::Ignored } else { Line::Malformed };
    }
    let (Some(wiki), Some(title), Some(total)) = (fields.first(), fields.get(1), fields.get(4)) else {
        return Line::Malformed;
    };
    if !wiki.starts_with(project) {
        return Line::Ignored;
    }
    match total.parse::<u64>() {
        Ok(count) => Line::Views(*title, count),
        Err(_) => Line::Malformed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_project_lines() {
        assert_eq!(
            parse_line("en.wikipedia Anarchism 12 desktop 1534 A12B9", "en.wikipedia"),
            Line::Views("Anarchism", 1534)
        );
        assert_eq!(
            parse_line("en.wikipedia Anarchism 12 mobile-web 7 G7", "en.wikipedia"),
            Line::Views("Anarchism", 7)
        );
        assert_eq!(
            parse_line("de.wikipedia Anarchismus 9 desktop 3 C3", "en.wikipedia"),
            Line::Ignored
        );
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(parse_line("en.wikipedia Anarchism 12", "en.wikipedia"), Line::Malformed);
        assert_eq!(
            parse_line("en.wikipedia Anarchism 12 desktop many A1", "en.wikipedia"),
            Line::Malformed
        );
        assert_eq!(parse_line("   ", "en.wikipedia"), Line::Ignored);
    }
}
