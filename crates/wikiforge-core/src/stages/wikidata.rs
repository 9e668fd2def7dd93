//! Wikidata splitting, filtering and gathering.
//!
//! The dump is one JSON array with one entity per line:
//!
//! ```text
//! [
//! {"type":"item","id":"Q42",...},
//! {"type":"property","id":"P31",...}
//! ]
//! ```
//!
//! Entities with no labels, aliases or claims serialize those maps as empty
//! arrays (`[]`), which the entity model accepts.

use super::keys::{WIKIDATA_CHUNKS, WIKIDATA_DUMP, WIKIDATA_TABLES};
use super::records::{
    ClaimRow, ItemAliasRow, ItemRow, ItemStatementRow, PropertyAliasRow, PropertyRow, QpqClaimRow, Row,
    SkippedEntityRow,
};
use super::{chunk_outputs, entity_number, gather, persist_manifests, plan_chunks};
use crate::artifact::ArtifactKey;
use crate::formats::{JsonlWriter, TableWriter, visit_lines};
use crate::partition::{ChunkDescriptor, ChunkManifest, partition_fixed};
use crate::pool::ChunkStats;
use crate::primitives::WIKIDATA_CHUNK_SIZE;
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// The JSON of an entity line, without the array's trailing comma.
fn entity_json(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let json = trimmed.strip_suffix(',').unwrap_or(trimmed);
    (!json.is_empty() && json != "[" && json != "]").then_some(json)
}

// =============================================================================
// SPLIT
// =============================================================================

/// Splits the dump into fixed-size JSONL chunks, honoring the entity cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitWikidata;

impl Stage for SplitWikidata {
    fn name(&self) -> &'static str {
        "split_wikidata"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![WIKIDATA_DUMP]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        vec![WIKIDATA_CHUNKS]
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let dump = ctx.locate(&WIKIDATA_DUMP, None);

        let mut entities = 0u64;
        visit_lines(&dump, |_, line| {
            if entity_json(line).is_some() {
                entities += 1;
            }
            Ok(true)
        })?;

        let cap = ctx.config.max_entities;
        let ranges = partition_fixed(entities, WIKIDATA_CHUNK_SIZE, cap)?;
        let manifest = ChunkManifest::for_ranges(&ranges, cap, |index| {
            vec![ctx.locate(&WIKIDATA_CHUNKS, Some(index))]
        });
        tracing::info!(entities, chunks = manifest.len(), %cap, "wikidata partitioned");
        plan_chunks(ctx, &WIKIDATA_CHUNKS, &manifest)?;

        let written = write_chunks(&dump, &manifest)?;
        ctx.store.write_manifest(ctx.snapshot(), &WIKIDATA_CHUNKS, &manifest)?;
        Ok(StageReport {
            records: written,
            chunks_computed: manifest.len(),
            ..StageReport::default()
        })
    }
}

/// Copy entity lines into the chunk files of `manifest` in one pass.
///
/// Chunks whose file already exists are passed over; stale files must have
/// been retired against the previous plan first.
fn write_chunks(dump: &std::path::Path, manifest: &ChunkManifest) -> Result<u64, ForgeError> {
    let mut cursor = 0usize;
    let mut writer: Option<JsonlWriter> = None;
    let mut entity = 0u64;
    let mut written = 0u64;

    visit_lines(dump, |_, line| {
        let Some(json) = entity_json(line) else {
            return Ok(true);
        };
        while let Some(chunk) = manifest.chunks.get(cursor) {
            if entity < chunk.end {
                break;
            }
            if let Some(done) = writer.take() {
                written += done.commit()?;
            }
            cursor += 1;
        }
        let Some(chunk) = manifest.chunks.get(cursor) else {
            return Ok(false);
        };
        if entity == chunk.start {
            let dest = chunk.output(0)?;
            writer = if dest.is_file() {
                tracing::debug!(chunk = chunk.index, "chunk exists, not rewriting");
                None
            } else {
                Some(JsonlWriter::create(dest)?)
            };
        }
        if let Some(out) = writer.as_mut() {
            out.write_raw(json)?;
        }
        entity += 1;
        Ok(true)
    })?;

    if let Some(done) = writer.take() {
        written += done.commit()?;
    }
    Ok(written)
}

// =============================================================================
// ENTITY MODEL
// =============================================================================

#[derive(Debug, Deserialize)]
struct Entity {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "lenient_map")]
    labels: BTreeMap<String, Term>,
    #[serde(default, deserialize_with = "lenient_map")]
    descriptions: BTreeMap<String, Term>,
    #[serde(default, deserialize_with = "lenient_map")]
    aliases: BTreeMap<String, Vec<Term>>,
    #[serde(default, deserialize_with = "lenient_map")]
    claims: BTreeMap<String, Vec<Claim>>,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Claim {
    mainsnak: Snak,
    #[serde(default, deserialize_with = "lenient_map")]
    qualifiers: BTreeMap<String, Vec<Snak>>,
}

#[derive(Debug, Deserialize)]
struct Snak {
    #[serde(default)]
    datavalue: Option<DataValue>,
}

#[derive(Debug, Deserialize)]
struct DataValue {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

impl Snak {
    /// Numeric id of the item this snak points at, if it points at one.
    fn item_target(&self) -> Option<u64> {
        let data = self.datavalue.as_ref()?;
        if data.kind != "wikibase-entityid" {
            return None;
        }
        if data.value.get("entity-type")?.as_str()? != "item" {
            return None;
        }
        data.value.get("numeric-id")?.as_u64()
    }
}

/// Accept `{}`-maps and the empty `[]` Wikidata writes for empty maps.
fn lenient_map<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape<V> {
        Map(BTreeMap<String, V>),
        List(Vec<serde::de::IgnoredAny>),
    }
    match Shape::deserialize(deserializer)? {
        Shape::Map(map) => Ok(map),
        Shape::List(items) if items.is_empty() => Ok(BTreeMap::new()),
        Shape::List(items) => Err(<D::Error as serde::de::Error>::custom(format!(
            "expected a map or an empty list, got a list of {}",
            items.len()
        ))),
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// Writers for the nine per-chunk tables, in [`WIKIDATA_TABLES`] order.
struct ChunkTables {
    item: TableWriter,
    item_alias: TableWriter,
    property: TableWriter,
    property_alias: TableWriter,
    p31: TableWriter,
    p279: TableWriter,
    qpq: TableWriter,
    statements: TableWriter,
    skipped: TableWriter,
}

impl ChunkTables {
    fn create(chunk: &ChunkDescriptor) -> Result<Self, ForgeError> {
        Ok(Self {
            item: TableWriter::create(chunk.output(0)?, ItemRow::COLUMNS)?,
            item_alias: TableWriter::create(chunk.output(1)?, ItemAliasRow::COLUMNS)?,
            property: TableWriter::create(chunk.output(2)?, PropertyRow::COLUMNS)?,
            property_alias: TableWriter::create(chunk.output(3)?, PropertyAliasRow::COLUMNS)?,
            p31: TableWriter::create(chunk.output(4)?, ClaimRow::COLUMNS)?,
            p279: TableWriter::create(chunk.output(5)?, ClaimRow::COLUMNS)?,
            qpq: TableWriter::create(chunk.output(6)?, QpqClaimRow::COLUMNS)?,
            statements: TableWriter::create(chunk.output(7)?, ItemStatementRow::COLUMNS)?,
            skipped: TableWriter::create(chunk.output(8)?, SkippedEntityRow::COLUMNS)?,
        })
    }

    fn commit(self) -> Result<(), ForgeError> {
        for table in [
            self.item,
            self.item_alias,
            self.property,
            self.property_alias,
            self.p31,
            self.p279,
            self.qpq,
            self.statements,
            self.skipped,
        ] {
            table.commit()?;
        }
        Ok(())
    }
}

/// Options that shape what an entity emits.
#[derive(Debug, Clone, Copy)]
struct FilterOptions<'a> {
    language: &'a str,
    item_statements: bool,
}

/// Turns each chunk's entities into the wikidata tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterWikidata;

impl Stage for FilterWikidata {
    fn name(&self) -> &'static str {
        "filter_wikidata"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        vec![WIKIDATA_CHUNKS]
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        WIKIDATA_TABLES.iter().map(|key| key.chunks()).collect()
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let keys = self.produces();
        let input = ctx.store.read_manifest(ctx.snapshot(), &WIKIDATA_CHUNKS)?;
        let manifest = input.follow_on(|index| chunk_outputs(ctx, &keys, index));
        plan_chunks(ctx, &keys[0], &manifest)?;
        let options = FilterOptions {
            language: ctx.snapshot().language(),
            item_statements: ctx.config.include_item_statements,
        };

        let report = ctx
            .pool
            .run(self.name(), &manifest, |chunk| filter_chunk(chunk, options))?;
        persist_manifests(ctx, &keys, &manifest)?;
        Ok(StageReport::from_pool(&report))
    }
}

fn filter_chunk(chunk: &ChunkDescriptor, options: FilterOptions<'_>) -> Result<ChunkStats, ForgeError> {
    let input = chunk
        .input
        .as_ref()
        .ok_or_else(|| ForgeError::InvalidPartition(format!("chunk {} has no input", chunk.index)))?;
    let mut tables = ChunkTables::create(chunk)?;
    let mut stats = ChunkStats::default();

    visit_lines(input, |line_no, line| {
        if chunk.budget.is_some_and(|budget| stats.records >= budget) {
            return Ok(false);
        }
        let Some(json) = entity_json(line) else {
            return Ok(true);
        };
        match serde_json::from_str::<Entity>(json) {
            Ok(entity) => {
                if emit(&entity, options, &mut tables)? {
                    stats.record();
                } else {
                    stats.skip();
                }
            }
            Err(e) => {
                let skipped = ForgeError::TransientRecord {
                    line: line_no,
                    reason: e.to_string(),
                };
                tracing::debug!(chunk = chunk.index, error = %skipped, "skipping entity");
                stats.skip();
            }
        }
        Ok(true)
    })?;

    tables.commit()?;
    Ok(stats)
}

/// Write the rows of one entity. Returns `false` when its id is unusable.
fn emit(entity: &Entity, options: FilterOptions<'_>, tables: &mut ChunkTables) -> Result<bool, ForgeError> {
    let label = term(&entity.labels, options.language);
    let description = term(&entity.descriptions, options.language);
    let aliases = entity
        .aliases
        .get(options.language)
        .map(|terms| terms.as_slice())
        .unwrap_or_default();

    match entity.kind.as_str() {
        "item" => {
            let Some(item_id) = entity_number(&entity.id, 'Q') else {
                return Ok(false);
            };
            tables.item.write_row(&ItemRow {
                item_id,
                label,
                description,
            })?;
            for alias in aliases {
                tables.item_alias.write_row(&ItemAliasRow {
                    item_id,
                    alias: alias.value.clone(),
                })?;
            }
            emit_claims(item_id, &entity.claims, options, tables)?;
        }
        "property" => {
            let Some(property_id) = entity_number(&entity.id, 'P') else {
                return Ok(false);
            };
            tables.property.write_row(&PropertyRow {
                property_id,
                label,
                description,
            })?;
            for alias in aliases {
                tables.property_alias.write_row(&PropertyAliasRow {
                    property_id,
                    alias: alias.value.clone(),
                })?;
            }
        }
        other => {
            tables.skipped.write_row(&SkippedEntityRow {
                entity_id: entity.id.clone(),
                entity_type: other.to_string(),
            })?;
        }
    }
    Ok(true)
}

fn emit_claims(
    source_id: u64,
    claims: &BTreeMap<String, Vec<Claim>>,
    options: FilterOptions<'_>,
    tables: &mut ChunkTables,
) -> Result<(), ForgeError> {
    for (property, statements) in claims {
        let Some(property_id) = entity_number(property, 'P') else {
            continue;
        };
        for claim in statements {
            let Some(target_id) = claim.mainsnak.item_target() else {
                continue;
            };
            let row = ClaimRow { source_id, target_id };
            match property_id {
                31 => tables.p31.write_row(&row)?,
                279 => tables.p279.write_row(&row)?,
                _ => {}
            }
            if options.item_statements {
                tables.statements.write_row(&ItemStatementRow {
                    source_id,
                    property_id,
                    target_id,
                })?;
            }
            for (qualifier, snaks) in &claim.qualifiers {
                let Some(qualifier_property_id) = entity_number(qualifier, 'P') else {
                    continue;
                };
                for qualifier_target_id in snaks.iter().filter_map(Snak::item_target) {
                    tables.qpq.write_row(&QpqClaimRow {
                        source_id,
                        property_id,
                        target_id,
                        qualifier_property_id,
                        qualifier_target_id,
                    })?;
                }
            }
        }
    }
    Ok(())
}

fn term(terms: &BTreeMap<String, Term>, language: &str) -> String {
    terms.get(language).map(|t| t.value.clone()).unwrap_or_default()
}

// =============================================================================
// GATHER
// =============================================================================

/// Concatenates each chunked wikidata table in chunk-index order.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatherWikidata;

/// Header of each table, in [`WIKIDATA_TABLES`] order.
const TABLE_COLUMNS: [&[&str]; 9] = [
    ItemRow::COLUMNS,
    ItemAliasRow::COLUMNS,
    PropertyRow::COLUMNS,
    PropertyAliasRow::COLUMNS,
    ClaimRow::COLUMNS,
    ClaimRow::COLUMNS,
    QpqClaimRow::COLUMNS,
    ItemStatementRow::COLUMNS,
    SkippedEntityRow::COLUMNS,
];

impl Stage for GatherWikidata {
    fn name(&self) -> &'static str {
        "gather_wikidata"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        WIKIDATA_TABLES.iter().map(|key| key.chunks()).collect()
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        WIKIDATA_TABLES.to_vec()
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let mut tally = RecordTally::default();
        for (key, columns) in WIKIDATA_TABLES.iter().zip(TABLE_COLUMNS) {
            let rows = gather(ctx, &key.chunks(), columns)?;
            tally = tally.merge(RecordTally::new(rows, 0));
        }
        Ok(StageReport::from_tally(tally))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::EntityCap;
    use std::path::Path;

    const ITEM_LINE: &str = r#"{"type":"item","id":"Q6199","labels":{"en":{"language":"en","value":"anarchism"},"fr":{"language":"fr","value":"anarchisme"}},"descriptions":{"en":{"language":"en","value":"political philosophy"}},"aliases":{"en":[{"language":"en","value":"anarchy"}]},"claims":{"P31":[{"mainsnak":{"snaktype":"value","property":"P31","datavalue":{"value":{"entity-type":"item","numeric-id":12909644,"id":"Q12909644"},"type":"wikibase-entityid"}},"qualifiers":{"P580":[{"snaktype":"value","datavalue":{"value":{"time":"+1840"},"type":"time"}}],"P642":[{"snaktype":"value","datavalue":{"value":{"entity-type":"item","numeric-id":7163,"id":"Q7163"},"type":"wikibase-entityid"}}]}}],"P279":[{"mainsnak":{"snaktype":"value","datavalue":{"value":{"entity-type":"item","numeric-id":179805},"type":"wikibase-entityid"}}}],"P18":[{"mainsnak":{"snaktype":"value","datavalue":{"value":"Flag.svg","type":"string"}}}]}},"#;
    const PROPERTY_LINE: &str = r#"{"type":"property","id":"P31","labels":{"en":{"language":"en","value":"instance of"}},"descriptions":[],"aliases":{"en":[{"language":"en","value":"is a"}]},"claims":[]},"#;
    const LEXEME_LINE: &str = r#"{"type":"lexeme","id":"L1"}"#;

    fn setup(dir: &Path, lines: &[&str]) -> (ChunkDescriptor, Vec<std::path::PathBuf>) {
        let input = dir.join("chunk.jsonl");
        std::fs::write(&input, lines.join("\n")).unwrap();
        let outputs: Vec<_> = (0..9).map(|i| dir.join(format!("out-{i}.csv"))).collect();
        let chunk = ChunkDescriptor {
            index: 0,
            start: 0,
            end: lines.len() as u64,
            budget: None,
            input: Some(input),
            outputs: outputs.clone(),
        };
        (chunk, outputs)
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn entity_lines() {
        assert_eq!(entity_json("["), None);
        assert_eq!(entity_json("]"), None);
        assert_eq!(entity_json(""), None);
        assert_eq!(entity_json("{\"id\":\"Q1\"},"), Some("{\"id\":\"Q1\"}"));
    }

    #[test]
    fn filter_writes_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let (chunk, out) = setup(dir.path(), &[ITEM_LINE, PROPERTY_LINE, LEXEME_LINE, "{not json"]);
        let options = FilterOptions {
            language: "en",
            item_statements: true,
        };
        let stats = filter_chunk(&chunk, options).unwrap();
        assert_eq!(stats, ChunkStats::new(3, 1));

        assert_eq!(read(&out[0]), "item_id,label,description\n6199,anarchism,political philosophy\n");
        assert_eq!(read(&out[1]), "item_id,alias\n6199,anarchy\n");
        assert_eq!(read(&out[2]), "property_id,label,description\n31,instance of,\n");
        assert_eq!(read(&out[3]), "property_id,alias\n31,is a\n");
        assert_eq!(read(&out[4]), "source_id,target_id\n6199,12909644\n");
        assert_eq!(read(&out[5]), "source_id,target_id\n6199,179805\n");
        assert_eq!(
            read(&out[6]),
            "source_id,property_id,target_id,qualifier_property_id,qualifier_target_id\n6199,31,12909644,642,7163\n"
        );
        assert_eq!(
            read(&out[7]),
            "source_id,property_id,target_id\n6199,279,179805\n6199,31,12909644\n"
        );
        assert_eq!(read(&out[8]), "entity_id,entity_type\nL1,lexeme\n");
    }

    #[test]
    fn statements_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let (chunk, out) = setup(dir.path(), &[ITEM_LINE]);
        let options = FilterOptions {
            language: "fr",
            item_statements: false,
        };
        filter_chunk(&chunk, options).unwrap();
        assert_eq!(read(&out[0]), "item_id,label,description\n6199,anarchisme,\n");
        assert_eq!(read(&out[7]), "source_id,property_id,target_id\n");
    }

    #[test]
    fn budget_stops_the_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunk, out) = setup(dir.path(), &[ITEM_LINE, PROPERTY_LINE, LEXEME_LINE]);
        chunk.budget = Some(1);
        let stats = filter_chunk(&chunk, FilterOptions {
            language: "en",
            item_statements: false,
        })
        .unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(read(&out[2]), "property_id,label,description\n");
    }

    #[test]
    fn split_respects_cap_and_chunk_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("dump.json");
        let body: Vec<String> = (1..=7).map(|i| format!("{{\"id\":\"Q{i}\"}},")).collect();
        std::fs::write(&dump, format!("[\n{}\n]\n", body.join("\n"))).unwrap();

        let cap = EntityCap::Limited(std::num::NonZeroU64::new(5).unwrap());
        let ranges = partition_fixed(7, 3, cap).unwrap();
        let manifest = ChunkManifest::for_ranges(&ranges, cap, |i| vec![dir.path().join(format!("c{i}.jsonl"))]);
        assert_eq!(write_chunks(&dump, &manifest).unwrap(), 5);

        assert_eq!(
            read(&dir.path().join("c0.jsonl")),
            "{\"id\":\"Q1\"}\n{\"id\":\"Q2\"}\n{\"id\":\"Q3\"}\n"
        );
        assert_eq!(read(&dir.path().join("c1.jsonl")), "{\"id\":\"Q4\"}\n{\"id\":\"Q5\"}\n");
        assert!(!dir.path().join("c2.jsonl").exists());
    }

    #[test]
    fn uncapped_split_after_capped_split_covers_every_entity() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("dump.json");
        let body: Vec<String> = (1..=7).map(|i| format!("{{\"id\":\"Q{i}\"}},")).collect();
        std::fs::write(&dump, format!("[\n{}\n]\n", body.join("\n"))).unwrap();
        let outputs = |i: u32| vec![dir.path().join(format!("c{i}.jsonl"))];

        let cap = EntityCap::Limited(std::num::NonZeroU64::new(5).unwrap());
        let capped = ChunkManifest::for_ranges(&partition_fixed(7, 3, cap).unwrap(), cap, outputs);
        capped.retire_stale(None).unwrap();
        write_chunks(&dump, &capped).unwrap();

        let full = ChunkManifest::for_ranges(
            &partition_fixed(7, 3, EntityCap::Unlimited).unwrap(),
            EntityCap::Unlimited,
            outputs,
        );
        full.retire_stale(Some(&capped)).unwrap();
        assert_eq!(write_chunks(&dump, &full).unwrap(), 7);

        let total: usize = full.outputs_at(0).iter().map(|p| read(p).lines().count()).sum();
        assert_eq!(total, 7);
        assert_eq!(read(&dir.path().join("c1.jsonl")).lines().count(), 3);
    }

    #[test]
    fn empty_list_stands_for_an_empty_map() {
        let entity: Entity = serde_json::from_str(r#"{"id":"Q1","type":"item","labels":[],"claims":[]}"#).unwrap();
        assert!(entity.labels.is_empty());
        assert!(entity.claims.is_empty());
        assert!(serde_json::from_str::<Entity>(r#"{"id":"Q1","type":"item","labels":[1]}"#).is_err());
    }
}
