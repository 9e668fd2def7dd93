//! Raw table projection and the page-props pivot.

use super::keys::{PAGE, PAGE_PROPS, PAGE_PROPS_FILTERED, PAGE_PROPS_TABLE, PAGE_TABLE, REDIRECT, REDIRECT_TABLE};
use super::records::{PagePropRow, PagePropsRow, PageRow, RawPageRow, RawRedirectRow, RedirectRow, Row};
use super::write_table;
use crate::artifact::ArtifactKey;
use crate::formats::{TableWriter, visit_rows};
use crate::primitives::{ARTICLE_NAMESPACE, PAGE_PROP_NAMES};
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use std::collections::BTreeMap;

// =============================================================================
// CONVERT TABLES
// =============================================================================

/// Projects the raw `page`, `redirect` and `page_props` tables onto the
/// columns later stages use, keeping article-namespace rows only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertTables;

impl Stage for ConvertTables {
    fn name(&self) -> &'static str {
        "convert_tables"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![PAGE_TABLE, REDIRECT_TABLE, PAGE_PROPS_TABLE]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![PAGE, REDIRECT, PAGE_PROPS_FILTERED]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let pages = project(ctx, &PAGE_TABLE, &PAGE, PageRow::COLUMNS, |row: RawPageRow| {
            (row.page_namespace == ARTICLE_NAMESPACE).then(|| PageRow {
                page_id: row.page_id,
                page_title: row.page_title,
                page_is_redirect: row.page_is_redirect != 0,
                page_len: row.page_len,
            })
        })?;
        let redirects = project(ctx, &REDIRECT_TABLE, &REDIRECT, RedirectRow::COLUMNS, |row: RawRedirectRow| {
            (row.rd_namespace == ARTICLE_NAMESPACE).then(|| RedirectRow {
                rd_from: row.rd_from,
                rd_title: row.rd_title,
            })
        })?;
        let props = project(
            ctx,
            &PAGE_PROPS_TABLE,
            &PAGE_PROPS_FILTERED,
            PagePropRow::COLUMNS,
            |row: PagePropRow| PAGE_PROP_NAMES.contains(&row.pp_propname.as_str()).then_some(row),
        )?;

        let tally = pages.merge(redirects).merge(props);
        ctx.check_tolerance(tally)?;
        Ok(StageReport::from_tally(tally))
    }
}

/// Stream `from` into `to`, keeping the rows `keep` maps to `Some`.
///
/// The tally counts rows read; filtered rows are records, not skips.
fn project<In, Out, F>(
    ctx: &StageContext<'_>,
    from: &ArtifactKey,
    to: &ArtifactKey,
    columns: &[&str],
    mut keep: F,
) -> Result<RecordTally, ForgeError>
where
    In: serde::de::DeserializeOwned,
    Out: serde::Serialize,
    F: FnMut(In) -> Option<Out>,
{
    let mut table = TableWriter::create(&ctx.locate(to, None), columns)?;
    let tally = visit_rows(&ctx.locate(from, None), |row: In| {
        if let Some(out) = keep(row) {
            table.write_row(&out)?;
        }
        Ok(())
    })?;
    let kept = table.commit()?;
    tracing::info!(table = to.name, read = tally.records, kept, skipped = tally.skipped, "converted");
    Ok(tally)
}

// =============================================================================
// PAGE PROPS PIVOT
// =============================================================================

/// Pivots filtered page props into one row per page.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatePageProps;

impl Stage for CreatePageProps {
    fn name(&self) -> &'static str {
        "create_page_props"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![PAGE_PROPS_FILTERED]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![PAGE_PROPS]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let mut pivot: BTreeMap<i64, PagePropsRow> = BTreeMap::new();
        let tally = visit_rows(&ctx.locate(&PAGE_PROPS_FILTERED, None), |row: PagePropRow| {
            pivot_prop(&mut pivot, row);
            Ok(())
        })?;
        ctx.check_tolerance(tally)?;
        let pages = write_table(&ctx.locate(&PAGE_PROPS, None), pivot.into_values())?;
        tracing::info!(pages, "page props pivoted");
        Ok(StageReport::from_tally(tally))
    }
}

fn pivot_prop(pivot: &mut BTreeMap<i64, PagePropsRow>, row: PagePropRow) {
    let entry = pivot.entry(row.pp_page).or_insert_with(|| PagePropsRow {
        page_id: row.pp_page,
        ..PagePropsRow::default()
    });
    match row.pp_propname.as_str() {
        "wikibase_item" => entry.wikibase_item = row.pp_value,
        "wikibase-shortdesc" => entry.wikibase_shortdesc = row.pp_value,
        _ => {}
    }
}
