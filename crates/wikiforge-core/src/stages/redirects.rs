//! Redirect edges, ultimate redirects and the title mapper.

use super::keys::{PAGE, REDIRECT, REDIRECT_EDGES, TITLE_MAPPER, ULTIMATE_REDIRECT};
use super::records::{PageRow, RedirectEdgeRow, RedirectRow, TitleMapperRow, UltimateRedirectRow};
use super::write_table;
use crate::artifact::ArtifactKey;
use crate::formats::{read_rows, visit_rows};
use crate::redirect::{RedirectEdge, RedirectKind, RedirectResolver};
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use std::collections::BTreeMap;

// =============================================================================
// REDIRECT EDGES
// =============================================================================

/// Joins redirects with pages: the source by id, the target by title.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateRedirectEdges;

impl Stage for CreateRedirectEdges {
    fn name(&self) -> &'static str {
        "create_redirect_edges"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![PAGE, REDIRECT]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![REDIRECT_EDGES]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let pages = read_rows::<PageRow>(&ctx.locate(&PAGE, None))?;
        let by_id: BTreeMap<i64, &str> = pages.rows.iter().map(|p| (p.page_id, p.page_title.as_str())).collect();
        let by_title: BTreeMap<&str, i64> = pages.rows.iter().map(|p| (p.page_title.as_str(), p.page_id)).collect();

        let mut edges: BTreeMap<i64, RedirectEdgeRow> = BTreeMap::new();
        let mut dangling = 0u64;
        let redirects = visit_rows(&ctx.locate(&REDIRECT, None), |row: RedirectRow| {
            match (by_id.get(&row.rd_from), by_title.get(row.rd_title.as_str())) {
                (Some(source_title), Some(&target_id)) => {
                    edges.insert(
                        row.rd_from,
                        RedirectEdgeRow {
                            source_id: row.rd_from,
                            source_title: (*source_title).to_string(),
                            target_id,
                            target_title: row.rd_title,
                        },
                    );
                }
                _ => dangling += 1,
            }
            Ok(())
        })?;

        let tally = pages.tally.merge(redirects);
        ctx.check_tolerance(tally)?;
        let written = write_table(&ctx.locate(&REDIRECT_EDGES, None), edges.into_values())?;
        tracing::info!(edges = written, dropped = dangling, "redirect edges joined");
        Ok(StageReport::from_tally(tally))
    }
}

// =============================================================================
// ULTIMATE REDIRECT
// =============================================================================

/// Collapses redirect chains with the [`RedirectResolver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateUltimateRedirect;

impl Stage for CreateUltimateRedirect {
    fn name(&self) -> &'static str {
        "create_ultimate_redirect"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![REDIRECT_EDGES]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![ULTIMATE_REDIRECT]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let edges = read_rows::<RedirectEdgeRow>(&ctx.locate(&REDIRECT_EDGES, None))?;
        ctx.check_tolerance(edges.tally)?;

        let mut ids: BTreeMap<&str, i64> = BTreeMap::new();
        for edge in &edges.rows {
            ids.insert(&edge.source_title, edge.source_id);
            ids.insert(&edge.target_title, edge.target_id);
        }

        let resolved = RedirectResolver::resolve_all(
            edges
                .rows
                .iter()
                .map(|e| RedirectEdge::new(e.source_title.as_str(), e.target_title.as_str())),
        );

        let rows = resolved.entries().iter().filter_map(|entry| {
            let source_id = ids.get(entry.source.as_str())?;
            let target_id = ids.get(entry.target.as_str())?;
            Some(UltimateRedirectRow {
                source_id: *source_id,
                source_title: entry.source.clone(),
                target_id: *target_id,
                target_title: entry.target.clone(),
                hops: entry.hops,
                kind: entry.kind,
            })
        });
        let written = write_table(&ctx.locate(&ULTIMATE_REDIRECT, None), rows)?;
        tracing::info!(
            redirects = written,
            cycles = resolved.cycles().len(),
            conflicts = resolved.conflicts(),
            "ultimate redirects resolved"
        );
        Ok(StageReport::from_tally(RecordTally::new(written, edges.tally.skipped)))
    }
}

// =============================================================================
// TITLE MAPPER
// =============================================================================

/// Maps every article page to the page its title finally leads to.
///
/// Non-redirects map to themselves. Redirects map to the end of their chain
/// when that end is an article; cycle members, cycle tails and redirects with
/// no resolvable article are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateTitleMapper;

impl Stage for CreateTitleMapper {
    fn name(&self) -> &'static str {
        "create_title_mapper"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![PAGE, ULTIMATE_REDIRECT]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![TITLE_MAPPER]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let pages = read_rows::<PageRow>(&ctx.locate(&PAGE, None))?;
        let redirects = read_rows::<UltimateRedirectRow>(&ctx.locate(&ULTIMATE_REDIRECT, None))?;
        let tally = pages.tally.merge(redirects.tally);
        ctx.check_tolerance(tally)?;

        let rows = map_titles(&pages.rows, &redirects.rows);
        let written = write_table(&ctx.locate(&TITLE_MAPPER, None), rows)?;
        tracing::info!(mapped = written, pages = pages.rows.len(), "title mapper built");
        Ok(StageReport::from_tally(tally))
    }
}

fn map_titles(pages: &[PageRow], redirects: &[UltimateRedirectRow]) -> Vec<TitleMapperRow> {
    let articles: BTreeMap<i64, &str> = pages
        .iter()
        .filter(|p| !p.page_is_redirect)
        .map(|p| (p.page_id, p.page_title.as_str()))
        .collect();
    let chains: BTreeMap<i64, &UltimateRedirectRow> = redirects
        .iter()
        .filter(|r| r.kind == RedirectKind::Chain && articles.contains_key(&r.target_id))
        .map(|r| (r.source_id, r))
        .collect();

    let mut rows: Vec<TitleMapperRow> = pages
        .iter()
        .filter_map(|page| {
            if !page.page_is_redirect {
                return Some(TitleMapperRow {
                    source_id: page.page_id,
                    source_title: page.page_title.clone(),
                    target_id: page.page_id,
                    target_title: page.page_title.clone(),
                    is_redirect: false,
                });
            }
            chains.get(&page.page_id).map(|chain| TitleMapperRow {
                source_id: page.page_id,
                source_title: page.page_title.clone(),
                target_id: chain.target_id,
                target_title: chain.target_title.clone(),
                is_redirect: true,
            })
        })
        .collect();
    rows.sort_by_key(|row| row.source_id);
    rows
}
