//! The article tables.
//!
//! `article-pre` carries what is known before parsing (item id, views and
//! class membership). `article` joins it with the parse statistics.

use super::entity_number;
use super::keys::{
    ARTICLE, ARTICLE_PRE, IN_OUT_COUNTS, LENGTHS, P31_CLAIM, P279_CLAIM, PAGE_PROPS, PAGEVIEWS, TEMPLATES,
    TITLE_MAPPER,
};
use super::records::{ClaimRow, PagePropsRow, PageviewRow, TitleMapperRow};
use crate::artifact::ArtifactKey;
use crate::formats::{CountsTable, TableWriter, read_counts, read_rows, visit_records, visit_rows};
use crate::primitives::{MISSING_ITEM_ID, ROOT_QIDS};
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Leading columns shared by `article-pre` and `article`.
const BASE_COLUMNS: [&str; 4] = ["page_id", "item_id", "page_title", "views"];

fn isa_column(root: u64) -> String {
    format!("isa_Q{root}")
}

// =============================================================================
// CLASS MEMBERSHIP
// =============================================================================

/// Every class reachable from `root` by following P279 edges backwards,
/// `root` included. `subclasses` maps a class to its direct subclasses.
fn subclass_closure(subclasses: &BTreeMap<u64, Vec<u64>>, root: u64) -> BTreeSet<u64> {
    let mut closure = BTreeSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(class) = queue.pop_front() {
        for &child in subclasses.get(&class).map_or(&[][..], Vec::as_slice) {
            if closure.insert(child) {
                queue.push_back(child);
            }
        }
    }
    closure
}

/// The smallest of `classes` inside `closure`, or 0.
fn smallest_member(classes: &[u64], closure: &BTreeSet<u64>) -> u64 {
    classes.iter().copied().filter(|c| closure.contains(c)).min().unwrap_or(0)
}

// =============================================================================
// ARTICLE PRE
// =============================================================================

/// One row per article page with its item id, views and `isa_Q{n}` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateArticlePre;

impl Stage for CreateArticlePre {
    fn name(&self) -> &'static str {
        "create_article_pre"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![TITLE_MAPPER, PAGE_PROPS, PAGEVIEWS, P31_CLAIM, P279_CLAIM]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![ARTICLE_PRE]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let mapper = read_rows::<TitleMapperRow>(&ctx.locate(&TITLE_MAPPER, None))?;
        let mut tally = mapper.tally;

        let mut items: BTreeMap<i64, i64> = BTreeMap::new();
        tally = tally.merge(visit_rows(&ctx.locate(&PAGE_PROPS, None), |row: PagePropsRow| {
            if let Some(item) = entity_number(&row.wikibase_item, 'Q').and_then(|n| i64::try_from(n).ok()) {
                items.insert(row.page_id, item);
            }
            Ok(())
        })?);

        let mut views: BTreeMap<String, u64> = BTreeMap::new();
        tally = tally.merge(visit_rows(&ctx.locate(&PAGEVIEWS, None), |row: PageviewRow| {
            views.insert(row.page_title, row.views);
            Ok(())
        })?);

        let mut subclasses: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        tally = tally.merge(visit_rows(&ctx.locate(&P279_CLAIM, None), |row: ClaimRow| {
            subclasses.entry(row.target_id).or_default().push(row.source_id);
            Ok(())
        })?);

        let mut instance_of: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        tally = tally.merge(visit_rows(&ctx.locate(&P31_CLAIM, None), |row: ClaimRow| {
            instance_of.entry(row.source_id).or_default().push(row.target_id);
            Ok(())
        })?);
        ctx.check_tolerance(tally)?;

        let closures: Vec<BTreeSet<u64>> = ROOT_QIDS.iter().map(|&root| subclass_closure(&subclasses, root)).collect();
        for (root, closure) in ROOT_QIDS.iter().zip(&closures) {
            tracing::debug!(root, classes = closure.len(), "subclass closure");
        }

        let mut articles: Vec<TitleMapperRow> = mapper.rows.into_iter().filter(|row| !row.is_redirect).collect();
        articles.sort_by_key(|row| row.source_id);

        let isa: Vec<String> = ROOT_QIDS.iter().map(|&root| isa_column(root)).collect();
        let mut header: Vec<&str> = BASE_COLUMNS.to_vec();
        header.extend(isa.iter().map(String::as_str));
        let mut table = TableWriter::create(&ctx.locate(&ARTICLE_PRE, None), &header)?;

        let mut with_item = 0u64;
        for article in &articles {
            let item = items.get(&article.source_id).copied();
            let classes = item
                .and_then(|id| u64::try_from(id).ok())
                .and_then(|id| instance_of.get(&id))
                .map_or(&[][..], Vec::as_slice);
            with_item += u64::from(item.is_some());

            let mut record = vec![
                article.source_id.to_string(),
                item.unwrap_or(MISSING_ITEM_ID).to_string(),
                article.source_title.clone(),
                views.get(&article.source_title).copied().unwrap_or(0).to_string(),
            ];
            record.extend(closures.iter().map(|closure| smallest_member(classes, closure).to_string()));
            table.write_record(&record)?;
        }
        let written = table.commit()?;
        tracing::info!(articles = written, with_item, "article-pre written");
        Ok(StageReport::from_tally(tally))
    }
}

// =============================================================================
// ARTICLE
// =============================================================================

/// Joins `article-pre` with link counts, lengths and template flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateArticle;

impl Stage for CreateArticle {
    fn name(&self) -> &'static str {
        "create_article"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![ARTICLE_PRE, IN_OUT_COUNTS, LENGTHS, TEMPLATES]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![ARTICLE]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let stats = ArticleStats {
            in_out: read_counts(&ctx.locate(&IN_OUT_COUNTS, None))?,
            lengths: read_counts(&ctx.locate(&LENGTHS, None))?,
            templates: read_counts(&ctx.locate(&TEMPLATES, None))?,
        };
        let tally = write_article(&ctx.locate(&ARTICLE_PRE, None), &stats, &ctx.locate(&ARTICLE, None))?;
        ctx.check_tolerance(tally)?;
        tracing::info!(articles = tally.records, "article written");
        Ok(StageReport::from_tally(tally))
    }
}

struct ArticleStats {
    in_out: CountsTable,
    lengths: CountsTable,
    templates: CountsTable,
}

impl ArticleStats {
    fn tally(&self) -> RecordTally {
        self.in_out.tally.merge(self.lengths.tally).merge(self.templates.tally)
    }
}

/// Write the joined article table. The tally counts article-pre rows plus
/// the rows skipped in every input.
fn write_article(pre: &Path, stats: &ArticleStats, dest: &Path) -> Result<RecordTally, ForgeError> {
    let mut rows: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    let mut tally = RecordTally::default();
    let pre_header = visit_records(pre, |header, record| {
        let page_id = record.get(0).and_then(|f| f.parse::<i64>().ok());
        match page_id {
            Some(page_id) if record.len() == header.len() => {
                rows.insert(page_id, record.iter().map(str::to_string).collect());
                tally.record();
            }
            _ => tally.skip(),
        }
        Ok(())
    })?;
    if pre_header.len() < BASE_COLUMNS.len() {
        return Err(ForgeError::Serialization(format!(
            "{} lacks the base article columns",
            pre.display()
        )));
    }
    let isa = &pre_header[BASE_COLUMNS.len()..];

    let tmpl: Vec<String> = stats.templates.columns.iter().map(|c| format!("tmpl_{c}")).collect();
    let mut header: Vec<&str> = BASE_COLUMNS.to_vec();
    header.extend(stats.lengths.columns.iter().map(String::as_str));
    header.extend(["in_link_count", "out_link_count"]);
    header.extend(tmpl.iter().map(String::as_str));
    header.extend(isa.iter().map(String::as_str));

    let mut table = TableWriter::create(dest, &header)?;
    for (page_id, pre_row) in &rows {
        let (base, classes) = pre_row.split_at(BASE_COLUMNS.len());
        let mut record: Vec<String> = base.to_vec();
        record.extend(stats.lengths.columns.iter().map(|c| stats.lengths.value(*page_id, c).to_string()));
        record.push(stats.in_out.value(*page_id, "in_count").to_string());
        record.push(stats.in_out.value(*page_id, "out_count").to_string());
        record.extend(stats.templates.columns.iter().map(|c| stats.templates.value(*page_id, c).to_string()));
        record.extend(classes.iter().cloned());
        table.write_record(&record)?;
    }
    table.commit()?;
    Ok(tally.merge(RecordTally::new(0, stats.tally().skipped)))
}
