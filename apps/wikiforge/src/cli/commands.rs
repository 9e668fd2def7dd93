//! # CLI Command Implementations
//!
//! Configuration is layered lowest to highest: built-in defaults, the TOML
//! file given with `--config`, the `WIKIFORGE_*` environment, command-line
//! flags.

use std::path::Path;
use wikiforge_core::config::{ConfigOverrides, Defaults, EffectiveConfig, resolve};
use wikiforge_core::{Facets, ForgeError, Pipeline, Sequencer, StageRecord, standard_pipeline};

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

// =============================================================================
// CONFIGURATION LAYERS
// =============================================================================

/// Read a TOML configuration layer.
pub fn load_config_file(path: &Path) -> Result<ConfigOverrides, ForgeError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ForgeError::Configuration(format!("cannot read config file '{}': {}", path.display(), e))
    })?;
    toml::from_str(&text)
        .map_err(|e| ForgeError::Configuration(format!("invalid config file '{}': {}", path.display(), e)))
}

/// The environment layer, read once.
pub fn env_overrides() -> Result<ConfigOverrides, ForgeError> {
    ConfigOverrides::from_lookup(|name| std::env::var(name).ok())
}

/// Resolve the effective configuration from every layer.
pub fn effective_config(
    file: Option<&Path>,
    env: ConfigOverrides,
    flags: ConfigOverrides,
) -> Result<EffectiveConfig, ForgeError> {
    let file_layer = match file {
        Some(path) => load_config_file(path)?,
        None => ConfigOverrides::default(),
    };
    let overrides = file_layer.layered(env).layered(flags);
    resolve(&Defaults::default(), &overrides)
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run the standard pipeline. Returns the error that halted the run.
pub fn cmd_run(config: EffectiveConfig, output: Output) -> Result<(), ForgeError> {
    let pipeline = Pipeline::new(config, Facets::default())?;
    let report = pipeline.run();

    if output.json {
        output.print_json(&serde_json::json!({
            "succeeded": report.succeeded(),
            "stages": report.records.iter().map(record_json).collect::<Vec<_>>(),
            "failure": report.failure.as_ref().map(ToString::to_string),
        }));
    } else if !output.quiet {
        println!("{:<28} {:<10} {:>12} {:>8} {:>8}", "STAGE", "STATE", "RECORDS", "SKIPPED", "CHUNKS");
        for record in &report.records {
            let (records, skipped, chunks) = record
                .report
                .map(|r| (r.records.to_string(), r.skipped.to_string(), r.chunks_computed.to_string()))
                .unwrap_or_else(|| ("-".into(), "-".into(), "-".into()));
            println!(
                "{:<28} {:<10} {:>12} {:>8} {:>8}",
                record.name,
                record.state.to_string(),
                records,
                skipped,
                chunks
            );
        }
    }

    report.into_result().map(|_| ())
}

fn record_json(record: &StageRecord) -> serde_json::Value {
    serde_json::json!({
        "name": record.name,
        "state": record.state,
        "report": record.report,
    })
}

// =============================================================================
// STAGES COMMAND
// =============================================================================

/// List the standard stages with their inputs and outputs.
pub fn cmd_stages(output: Output) -> Result<(), ForgeError> {
    let descriptors = Sequencer::new(standard_pipeline())?.descriptors();

    if output.json {
        let stages: Vec<_> = descriptors
            .iter()
            .map(|d| {
                serde_json::json!({
                    "ordinal": d.ordinal,
                    "name": d.name,
                    "requires": d.requires.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "produces": d.produces.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })
            })
            .collect();
        output.print_json(&serde_json::json!({ "stages": stages }));
        return Ok(());
    }

    for d in &descriptors {
        println!("{:>2}. {}", d.ordinal + 1, d.name);
        if output.quiet {
            continue;
        }
        for key in &d.produces {
            println!("      -> {key}");
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show, per stage, whether every output is present.
pub fn cmd_status(config: EffectiveConfig, output: Output) -> Result<(), ForgeError> {
    let pipeline = Pipeline::new(config, Facets::default())?;
    let statuses = pipeline.status();

    if output.json {
        let snapshot = &pipeline.config().snapshot;
        let stages: Vec<_> = statuses
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.descriptor.name,
                    "complete": s.complete(),
                    "missing": s.missing.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                })
            })
            .collect();
        output.print_json(&serde_json::json!({
            "wikipedia": snapshot.wikipedia.to_string(),
            "wikidata": snapshot.wikidata.to_string(),
            "wiki": snapshot.wiki,
            "stages": stages,
        }));
        return Ok(());
    }

    let complete = statuses.iter().filter(|s| s.complete()).count();
    for status in &statuses {
        let mark = if status.complete() { "done" } else { "missing" };
        println!("{:<28} {}", status.descriptor.name, mark);
        if !output.quiet {
            for path in &status.missing {
                println!("      {}", path.display());
            }
        }
    }
    println!();
    println!("{complete}/{} stages complete", statuses.len());
    Ok(())
}
