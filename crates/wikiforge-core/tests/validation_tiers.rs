//! # Validation Tier Tests (T0-T4)
//!
//! If ANY tier fails, the pipeline is INVALID.
//!
//! ## Tiers
//! - T0: Configuration & Artifact Layout
//! - T1: Redirect Resolution
//! - T2: Worker Pool Fault Isolation
//! - T3: Sequencer Ordering & Fail-Fast
//! - T4: End-to-End Run & Resumability

#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wikiforge_core::config::{ConfigOverrides, Defaults, resolve};
use wikiforge_core::{
    ArtifactKey, ArtifactStore, Corpus, EffectiveConfig, Facets, ForgeError, Format, Pipeline, Stage,
    StageContext, StageReport, StageState,
};

fn config_in(root: &Path, mirror: &Path) -> EffectiveConfig {
    let overrides = ConfigOverrides {
        wikipedia_date: Some("20210120".into()),
        wikidata_date: Some("20210118".into()),
        data_path: Some(root.to_path_buf()),
        mirror_url: Some(mirror.display().to_string()),
        workers: Some(2),
        ..ConfigOverrides::default()
    };
    resolve(&Defaults::default(), &overrides).expect("valid config")
}

// =============================================================================
// TIER T0: CONFIGURATION & ARTIFACT LAYOUT
// =============================================================================

mod t0_configuration {
    use super::*;
    use wikiforge_core::config::CapSetting;

    /// T0.1: Both snapshot dates are required.
    #[test]
    fn missing_date_rejected() {
        let overrides = ConfigOverrides {
            wikipedia_date: Some("20210120".into()),
            ..ConfigOverrides::default()
        };
        let result = resolve(&Defaults::default(), &overrides);
        assert!(matches!(result, Err(ForgeError::Configuration(_))));
    }

    /// T0.2: Unknown download jobs are named in the error.
    #[test]
    fn unknown_job_rejected() {
        let overrides = ConfigOverrides {
            wikipedia_date: Some("20210120".into()),
            wikidata_date: Some("20210118".into()),
            jobs: Some("pagetable, bogus".into()),
            ..ConfigOverrides::default()
        };
        match resolve(&Defaults::default(), &overrides) {
            Err(ForgeError::Configuration(msg)) => assert!(msg.contains("bogus")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    /// T0.3: Zero and negative worker counts are rejected, zero entities means unlimited.
    #[test]
    fn worker_and_cap_validation() {
        let base = ConfigOverrides {
            wikipedia_date: Some("20210120".into()),
            wikidata_date: Some("20210118".into()),
            ..ConfigOverrides::default()
        };
        for workers in [0, -3] {
            let overrides = ConfigOverrides {
                workers: Some(workers),
                ..base.clone()
            };
            assert!(resolve(&Defaults::default(), &overrides).is_err());
        }
        let overrides = ConfigOverrides {
            max_entities: Some(CapSetting::Word("0".into())),
            ..base
        };
        let config = resolve(&Defaults::default(), &overrides).expect("valid");
        assert_eq!(config.max_entities.limit(), None);
    }

    /// T0.4: Artifact paths depend only on snapshot and key.
    #[test]
    fn artifact_paths_are_deterministic() {
        let a = config_in(Path::new("/data"), Path::new("/mirror"));
        let b = config_in(Path::new("/data"), Path::new("/elsewhere"));
        let key = ArtifactKey::derived(Corpus::Wikipedia, "links", Format::Csv);
        let store = ArtifactStore::new();
        assert_eq!(store.locate(&a.snapshot, &key, None), store.locate(&b.snapshot, &key, None));
        assert_eq!(
            store.locate(&a.snapshot, &key, None),
            PathBuf::from("/data/wikipedia-derived-20210120/enwiki/links/enwiki-20210120-links.csv")
        );
    }

    /// T0.5: Chunk listing is ascending and ignores temp files.
    #[test]
    fn list_chunks_is_ordered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path(), dir.path());
        let store = ArtifactStore::new();
        let key = ArtifactKey::derived(Corpus::Wikipedia, "links", Format::Csv).chunks();
        for index in [10, 2, 7] {
            let path = store.locate(&config.snapshot, &key, Some(index));
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(&path, "x\n").expect("write");
        }
        let stray = store.locate(&config.snapshot, &key, Some(3));
        std::fs::write(format!("{}.tmp", stray.display()), "x\n").expect("write");

        assert_eq!(store.list_chunks(&config.snapshot, &key).expect("list"), vec![2, 7, 10]);
        assert!(!store.is_present(&config.snapshot, &key));
    }
}

// =============================================================================
// TIER T1: REDIRECT RESOLUTION
// =============================================================================

mod t1_redirects {
    use wikiforge_core::{RedirectEdge, RedirectKind, RedirectResolver};

    /// T1.1: A three-cycle terminates; each member resolves to itself.
    #[test]
    fn three_cycle_terminates() {
        let resolved = RedirectResolver::resolve_all([
            RedirectEdge::new("A", "B"),
            RedirectEdge::new("B", "C"),
            RedirectEdge::new("C", "A"),
        ]);
        for title in ["A", "B", "C"] {
            let entry = resolved.get(title).expect("entry");
            assert_eq!(entry.target, title);
            assert_eq!(entry.hops, 3);
            assert_eq!(entry.kind, RedirectKind::Cycle);
        }
        assert_eq!(resolved.cycles().len(), 1);
    }

    /// T1.2: Chains collapse to their terminal title.
    #[test]
    fn chain_collapses() {
        let resolved = RedirectResolver::resolve_all([
            RedirectEdge::new("A", "B"),
            RedirectEdge::new("B", "C"),
            RedirectEdge::new("C", "D"),
        ]);
        assert_eq!(resolved.resolve("A"), ("D", 3));
        assert_eq!(resolved.resolve("B"), ("D", 2));
        assert_eq!(resolved.resolve("D"), ("D", 0));
    }
}

// =============================================================================
// TIER T2: WORKER POOL FAULT ISOLATION
// =============================================================================

mod t2_pool {
    use super::*;
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use wikiforge_core::partition::partition;
    use wikiforge_core::{ChunkManifest, EntityCap, RecordTally, SkipTolerance, WorkerPool};

    fn one_per_chunk(dir: &Path, chunks: usize) -> ChunkManifest {
        let ranges = partition(chunks as u64, chunks, EntityCap::Unlimited).expect("partition");
        ChunkManifest::for_ranges(&ranges, EntityCap::Unlimited, |i| vec![dir.join(format!("chunk-{i}.csv"))])
    }

    /// T2.1: With one worker, a failing third chunk stops the later chunks.
    #[test]
    fn failure_isolates_later_chunks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = one_per_chunk(dir.path(), 5);
        let pool = WorkerPool::new(NonZeroUsize::MIN, SkipTolerance::strict());
        let started = Mutex::new(Vec::new());

        let result = pool.run("isolation", &manifest, |chunk| {
            started.lock().expect("lock").push(chunk.index);
            std::fs::write(&chunk.outputs[0], "x\n")?;
            if chunk.index == 2 {
                return Err(ForgeError::Io("disk on fire".into()));
            }
            Ok(RecordTally::new(1, 0))
        });

        match result {
            Err(ForgeError::ChunkFatal { chunk, incomplete, .. }) => {
                assert_eq!(chunk, 2);
                assert_eq!(incomplete, vec![2, 3, 4]);
            }
            other => panic!("expected chunk failure, got {other:?}"),
        }
        assert_eq!(*started.lock().expect("lock"), vec![0, 1, 2]);
        assert!(dir.path().join("chunk-0.csv").is_file());
        assert!(dir.path().join("chunk-1.csv").is_file());
        assert!(!dir.path().join("chunk-2.csv").exists());
    }

    /// T2.2: Transient skips above tolerance escalate to a chunk failure.
    #[test]
    fn skips_escalate_above_tolerance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = one_per_chunk(dir.path(), 2);
        let tolerance = SkipTolerance::from_ppm(100_000).expect("tolerance");
        let pool = WorkerPool::new(NonZeroUsize::new(2).expect("two"), tolerance);

        let lenient = pool.run("skips", &manifest, |chunk| {
            std::fs::write(&chunk.outputs[0], "x\n")?;
            Ok(RecordTally::new(95, 5))
        });
        assert_eq!(lenient.expect("within tolerance").tally(), RecordTally::new(190, 10));

        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = one_per_chunk(dir.path(), 2);
        let strict = pool.run("skips", &manifest, |_| Ok(RecordTally::new(50, 50)));
        assert!(matches!(strict, Err(ForgeError::ChunkFatal { .. })));
    }
}

// =============================================================================
// TIER T3: SEQUENCER ORDERING & FAIL-FAST
// =============================================================================

mod t3_sequencer {
    use super::*;
    use wikiforge_core::Sequencer;
    use wikiforge_core::formats::TableWriter;

    const ALPHA: ArtifactKey = ArtifactKey::derived(Corpus::Wikipedia, "alpha", Format::Csv);
    const BETA: ArtifactKey = ArtifactKey::derived(Corpus::Wikipedia, "beta", Format::Csv);
    const GAMMA: ArtifactKey = ArtifactKey::derived(Corpus::Wikipedia, "gamma", Format::Csv);

    struct Touch {
        name: &'static str,
        requires: Vec<ArtifactKey>,
        writes: ArtifactKey,
    }

    impl Stage for Touch {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires(&self) -> Vec<ArtifactKey> {
            self.requires.clone()
        }

        fn produces(&self) -> Vec<ArtifactKey> {
            vec![self.writes]
        }

        fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
            TableWriter::create(&ctx.locate(&self.writes, None), &["x"])?.commit()?;
            Ok(StageReport::default())
        }
    }

    struct Broken;

    impl Stage for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn requires(&self) -> Vec<ArtifactKey> {
            vec![ALPHA]
        }

        fn produces(&self) -> Vec<ArtifactKey> {
            vec![BETA]
        }

        fn run(&self, _ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
            Err(ForgeError::Io("input vanished".into()))
        }
    }

    fn touch(name: &'static str, requires: &[ArtifactKey], writes: ArtifactKey) -> Box<dyn Stage> {
        Box::new(Touch {
            name,
            requires: requires.to_vec(),
            writes,
        })
    }

    /// T3.1: A stage may only require what an earlier stage produces.
    #[test]
    fn order_is_validated() {
        let result = Sequencer::new(vec![touch("second", &[ALPHA], BETA), touch("first", &[], ALPHA)]);
        assert!(matches!(result, Err(ForgeError::InvalidStageOrder(_))));

        let result = Sequencer::new(vec![touch("one", &[], ALPHA), touch("two", &[], ALPHA)]);
        assert!(matches!(result, Err(ForgeError::InvalidStageOrder(_))));
    }

    /// T3.2: A failing stage halts the run; later stages never run.
    #[test]
    fn failure_halts_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path(), dir.path());
        let snapshot = config.snapshot.clone();
        let pipeline = Pipeline::with_stages(
            config,
            Facets::default(),
            vec![touch("alpha", &[], ALPHA), Box::new(Broken), touch("gamma", &[BETA], GAMMA)],
        )
        .expect("valid order");

        let report = pipeline.run();
        let failure = report.failure.as_ref().expect("failure");
        assert_eq!(failure.failed_stage(), Some("broken"));
        assert_eq!(report.record("alpha").map(|r| r.state), Some(StageState::Completed { reused: false }));
        assert_eq!(report.record("broken").map(|r| r.state), Some(StageState::Failed));
        assert_eq!(report.record("gamma").map(|r| r.state), Some(StageState::Pending));

        let store = ArtifactStore::new();
        assert!(store.is_present(&snapshot, &ALPHA));
        assert!(!store.is_present(&snapshot, &GAMMA));
    }

    /// A stage that claims an output but never writes it.
    struct Silent;

    impl Stage for Silent {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn requires(&self) -> Vec<ArtifactKey> {
            Vec::new()
        }

        fn produces(&self) -> Vec<ArtifactKey> {
            vec![ALPHA]
        }

        fn run(&self, _ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
            Ok(StageReport::default())
        }
    }

    /// T3.3: A missing input is a precondition failure of the requiring stage.
    #[test]
    fn missing_input_is_a_precondition_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = Pipeline::with_stages(
            config_in(dir.path(), dir.path()),
            Facets::default(),
            vec![Box::new(Silent), touch("beta", &[ALPHA], BETA)],
        )
        .expect("valid order");

        let report = pipeline.run();
        let failure = report.failure.as_ref().expect("failure");
        assert_eq!(failure.failed_stage(), Some("beta"));
        assert!(failure.to_string().contains("alpha"));
        assert_eq!(report.record("silent").map(|r| r.state), Some(StageState::Completed { reused: false }));
        assert_eq!(report.record("beta").map(|r| r.state), Some(StageState::Failed));
    }

    /// T3.4: With skip-completed, stages whose outputs exist never run.
    #[test]
    fn completed_stages_are_not_rerun() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EffectiveConfig {
            skip_completed: true,
            ..config_in(dir.path(), dir.path())
        };
        let store = ArtifactStore::new();
        for key in [ALPHA, BETA] {
            TableWriter::create(&store.locate(&config.snapshot, &key, None), &["x"])
                .expect("create")
                .commit()
                .expect("commit");
        }
        let pipeline = Pipeline::with_stages(
            config,
            Facets::default(),
            vec![touch("alpha", &[], ALPHA), Box::new(Broken), touch("gamma", &[BETA], GAMMA)],
        )
        .expect("valid order");

        let report = pipeline.run();
        assert!(report.succeeded());
        assert_eq!(report.record("broken").map(|r| r.state), Some(StageState::Completed { reused: true }));
        assert_eq!(report.record("gamma").map(|r| r.state), Some(StageState::Completed { reused: false }));
        assert!(pipeline.status().iter().all(|s| s.complete()));
    }
}

// =============================================================================
// TIER T4: END-TO-END RUN & RESUMABILITY
// =============================================================================

mod t4_end_to_end {
    use super::*;
    use std::num::{NonZeroU64, NonZeroUsize};
    use wikiforge_core::EntityCap;
    use wikiforge_core::stages::keys;

    const ARTICLES: &str = concat!(
        r#"{"page_id":12,"title":"Anarchism","text":"'''Anarchism''' is a [[political philosophy]].\n\nSee [[Anarchy|anarchists]]."}"#,
        "\n",
        r#"{"page_id":40,"title":"Political_philosophy","text":"Studies [[anarchism]]."}"#,
        "\n",
    );

    const WIKIDATA: &str = concat!(
        "[\n",
        r#"{"type":"item","id":"Q6199","labels":{"en":{"language":"en","value":"anarchism"}},"descriptions":{"en":{"language":"en","value":"political philosophy"}},"aliases":{},"claims":{"P31":[{"mainsnak":{"datavalue":{"type":"wikibase-entityid","value":{"entity-type":"item","numeric-id":12909644,"id":"Q12909644"}}}}]}},"#,
        "\n",
        r#"{"type":"item","id":"Q12909644","labels":{},"descriptions":[],"aliases":[],"claims":{"P279":[{"mainsnak":{"datavalue":{"type":"wikibase-entityid","value":{"entity-type":"item","numeric-id":5,"id":"Q5"}}}}]}},"#,
        "\n",
        r#"{"type":"property","id":"P31","labels":{"en":{"language":"en","value":"instance of"}},"aliases":{"en":[{"language":"en","value":"is a"}]}},"#,
        "\n",
        r#"{"type":"lexeme","id":"L7"}"#,
        "\n]\n",
    );

    /// Write a minimal local mirror for enwiki 20210120 / wikidata 20210118.
    fn mirror(root: &Path) {
        let files = [
            ("articlesdump/enwiki-20210120-pages-articles1.jsonl", ARTICLES),
            (
                "pagetable/enwiki-20210120-page.csv",
                "page_id,page_namespace,page_title,page_is_redirect,page_len\n\
                 12,0,Anarchism,0,100\n13,0,Anarchy,1,20\n40,0,Political_philosophy,0,50\n41,1,Talk_page,0,5\n",
            ),
            (
                "pagepropstable/enwiki-20210120-page_props.csv",
                "pp_page,pp_propname,pp_value\n12,wikibase_item,Q6199\n\
                 12,wikibase-shortdesc,Political philosophy\n40,wikibase_item,Q179805\n12,page_image,Flag.svg\n",
            ),
            (
                "redirecttable/enwiki-20210120-redirect.csv",
                "rd_from,rd_namespace,rd_title\n13,0,Anarchism\n",
            ),
            (
                "pageviewcomplete/pageviews-20201201-user",
                "en.wikipedia Anarchism 12 desktop 1534 A12B9\n\
                 en.wikipedia Anarchism 12 mobile-web 7 G7\n\
                 de.wikipedia Anarchismus 9 desktop 3 C3\n",
            ),
            ("wikidatajson/wikidata-20210118-all.json", WIKIDATA),
        ];
        for (name, body) in files {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(path, body).expect("write fixture");
        }
    }

    fn table(path: &Path) -> Vec<BTreeMap<String, String>> {
        let mut reader = csv::Reader::from_path(path).expect("open table");
        let header = reader.headers().expect("header").clone();
        reader
            .records()
            .map(|record| {
                let record = record.expect("record");
                header
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }

    fn setup() -> (tempfile::TempDir, EffectiveConfig) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mirror_root = dir.path().join("mirror");
        mirror(&mirror_root);
        let config = config_in(&dir.path().join("data"), &mirror_root);
        (dir, config)
    }

    /// T4.1: The standard pipeline builds the article table from the fixture.
    #[test]
    fn standard_pipeline_builds_articles() {
        let (_dir, config) = setup();
        let snapshot = config.snapshot.clone();
        let pipeline = Pipeline::new(config, Facets::default()).expect("pipeline");

        let report = pipeline.run();
        if let Some(err) = &report.failure {
            panic!("run failed: {err}");
        }
        assert!(report.records.iter().all(|r| r.state == StageState::Completed { reused: false }));

        let store = ArtifactStore::new();
        let articles = table(&store.locate(&snapshot, &keys::ARTICLE, None));
        assert_eq!(articles.len(), 2);

        let anarchism = &articles[0];
        assert_eq!(anarchism["page_id"], "12");
        assert_eq!(anarchism["item_id"], "6199");
        assert_eq!(anarchism["views"], "1541");
        assert_eq!(anarchism["in_link_count"], "2");
        assert_eq!(anarchism["out_link_count"], "2");
        assert_eq!(anarchism["isa_Q5"], "12909644");
        assert_eq!(anarchism["isa_Q43229"], "0");

        let philosophy = &articles[1];
        assert_eq!(philosophy["page_id"], "40");
        assert_eq!(philosophy["item_id"], "179805");
        assert_eq!(philosophy["views"], "0");
        assert_eq!(philosophy["in_link_count"], "1");

        let mapper = table(&store.locate(&snapshot, &keys::TITLE_MAPPER, None));
        let anarchy = mapper.iter().find(|r| r["source_title"] == "Anarchy").expect("redirect row");
        assert_eq!(anarchy["target_id"], "12");

        let skipped = table(&store.locate(&snapshot, &keys::SKIPPED_ENTITY, None));
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0]["entity_type"], "lexeme");

        let edges = std::fs::read_to_string(store.locate(&snapshot, &keys::LINKS_EDGES, None)).expect("edges");
        assert_eq!(edges, "source_page_id,target_page_id\n12,12\n12,40\n40,12\n");
    }

    /// T4.2: A second run with skip-completed reuses every stage, and a
    /// deleted output is rebuilt alone.
    #[test]
    fn rerun_reuses_completed_stages() {
        let (_dir, config) = setup();
        let snapshot = config.snapshot.clone();
        assert!(Pipeline::new(config.clone(), Facets::default()).expect("pipeline").run().succeeded());

        let resumed = EffectiveConfig {
            skip_completed: true,
            ..config
        };
        let pipeline = Pipeline::new(resumed, Facets::default()).expect("pipeline");
        let report = pipeline.run();
        assert!(report.succeeded());
        assert!(report.records.iter().all(|r| r.state == StageState::Completed { reused: true }));
        assert!(pipeline.status().iter().all(|s| s.complete()));

        let article = ArtifactStore::new().locate(&snapshot, &keys::ARTICLE, None);
        let before = std::fs::read(&article).expect("article");
        std::fs::remove_file(&article).expect("remove");

        let report = pipeline.run();
        assert!(report.succeeded());
        assert_eq!(
            report.record("create_article").map(|r| r.state),
            Some(StageState::Completed { reused: false })
        );
        assert_eq!(
            report.record("parse_wikitext").map(|r| r.state),
            Some(StageState::Completed { reused: true })
        );
        assert_eq!(std::fs::read(&article).expect("article"), before);
    }

    /// T4.3: An uncapped run after a capped one rebuilds the chunks the cap
    /// clipped instead of reusing them.
    #[test]
    fn uncapped_run_after_capped_run_sees_every_entity() {
        let (_dir, config) = setup();
        let snapshot = config.snapshot.clone();
        let capped = EffectiveConfig {
            max_entities: EntityCap::Limited(NonZeroU64::new(2).expect("two")),
            ..config.clone()
        };
        assert!(Pipeline::new(capped, Facets::default()).expect("pipeline").run().succeeded());

        let store = ArtifactStore::new();
        assert!(table(&store.locate(&snapshot, &keys::SKIPPED_ENTITY, None)).is_empty());
        assert!(table(&store.locate(&snapshot, &keys::PROPERTY, None)).is_empty());

        let report = Pipeline::new(config, Facets::default()).expect("pipeline").run();
        assert!(report.succeeded());
        let split = report.record("split_wikidata").and_then(|r| r.report).expect("split report");
        assert_eq!(split.records, 4);

        let skipped = table(&store.locate(&snapshot, &keys::SKIPPED_ENTITY, None));
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0]["entity_id"], "L7");
        assert_eq!(table(&store.locate(&snapshot, &keys::PROPERTY, None)).len(), 1);
    }

    /// T4.4: A failed chunk leaves its stage's outputs absent; the next run
    /// reuses the chunks that completed and recomputes the rest.
    #[test]
    fn failed_chunk_leaves_outputs_absent() {
        let (dir, config) = setup();
        let articles = dir.path().join("mirror/articlesdump");
        let pages = [
            r#"{"page_id":12,"title":"Anarchism","text":"Anarchism is a [[political philosophy]]."}"#,
            r#"{"page_id":40,"title":"Political_philosophy","text":"Studies [[anarchism]]."}"#,
            "{broken",
        ];
        for (i, body) in pages.iter().enumerate() {
            let name = format!("enwiki-20210120-pages-articles{}.jsonl", i + 1);
            std::fs::write(articles.join(name), format!("{body}\n")).expect("write");
        }
        let config = EffectiveConfig {
            workers: NonZeroUsize::MIN,
            ..config
        };
        let snapshot = config.snapshot.clone();
        let pipeline = Pipeline::new(config, Facets::default()).expect("pipeline");

        let report = pipeline.run();
        let failure = report.failure.as_ref().expect("failure");
        assert_eq!(failure.failed_stage(), Some("parse_wikitext"));
        assert_eq!(report.record("parse_wikitext").map(|r| r.state), Some(StageState::Failed));
        assert_eq!(report.record("post_process_links").map(|r| r.state), Some(StageState::Pending));

        let store = ArtifactStore::new();
        let links = keys::LINKS_CHUNKS;
        assert!(!store.is_present(&snapshot, &links));
        assert!(!store.manifest_path(&snapshot, &links).exists());
        assert_eq!(store.list_chunks(&snapshot, &links).expect("list"), vec![0, 1]);

        std::fs::write(store.locate(&snapshot, &keys::ARTICLES_DUMP, Some(2)), "").expect("repair");
        let report = pipeline.run();
        assert!(report.succeeded());
        let parse = report.record("parse_wikitext").and_then(|r| r.report).expect("parse report");
        assert_eq!(parse.chunks_reused, 2);
        assert_eq!(parse.chunks_computed, 1);
        assert!(store.is_present(&snapshot, &links));
    }

    /// T4.5: A remote mirror fails the download stage and nothing after it runs.
    #[test]
    fn remote_mirror_fails_first_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EffectiveConfig {
            mirror_url: "https://dumps.wikimedia.org".into(),
            ..config_in(dir.path(), dir.path())
        };
        let report = Pipeline::new(config, Facets::default()).expect("pipeline").run();
        let failure = report.failure.as_ref().expect("failure");
        assert_eq!(failure.failed_stage(), Some("download_raw_dumps"));
        assert!(report.records.iter().skip(1).all(|r| r.state == StageState::Pending));
    }
}
