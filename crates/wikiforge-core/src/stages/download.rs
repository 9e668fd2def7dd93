//! Raw dump retrieval.

use super::keys::raw_key;
use crate::artifact::ArtifactKey;
use crate::config::{DownloadJob, EntityCap};
use crate::facet::FetchRequest;
use crate::formats::copy_atomic;
use crate::partition::ChunkManifest;
use crate::system::{Stage, StageContext, StageReport};
use crate::types::{ForgeError, RecordTally};
use std::path::PathBuf;

/// Fetches each configured job and lays its files out in the raw layer.
///
/// Multi-file jobs (article dump parts, daily pageview files) become chunked
/// raw artifacts with one chunk per file. A raw artifact that is already
/// present is not fetched again.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadRawDumps;

impl Stage for DownloadRawDumps {
    fn name(&self) -> &'static str {
        "download_raw_dumps"
    }

    fn requires(&self) -> Vec<ArtifactKey> {
        Vec::new()
    }

    fn produces(&self) -> Vec<ArtifactKey> {
        DownloadJob::ALL.iter().map(|job| raw_key(*job)).collect()
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, ForgeError> {
        let mut tally = RecordTally::default();
        for &job in &ctx.config.jobs {
            let key = raw_key(job);
            if ctx.store.is_present(ctx.snapshot(), &key) {
                tracing::info!(%job, "raw artifact present, not fetching");
                continue;
            }
            let files = ctx.facets.fetcher.fetch(&FetchRequest {
                job,
                snapshot: ctx.snapshot(),
                mirror: &ctx.config.mirror_url,
            })?;

            if key.chunked {
                let manifest = ChunkManifest::for_inputs(&files, EntityCap::Unlimited, |index| {
                    vec![ctx.locate(&key, Some(index))]
                });
                for chunk in &manifest.chunks {
                    if let Some(src) = &chunk.input {
                        copy_atomic(src, chunk.output(0)?)?;
                        tally.record();
                    }
                }
                ctx.store.write_manifest(ctx.snapshot(), &key, &manifest)?;
            } else {
                let src = single_file(job, files)?;
                copy_atomic(&src, &ctx.locate(&key, None))?;
                tally.record();
            }
            tracing::info!(%job, artifact = %key, "fetched");
        }
        Ok(StageReport::from_tally(tally))
    }
}

fn single_file(job: DownloadJob, files: Vec<PathBuf>) -> Result<PathBuf, ForgeError> {
    let count = files.len();
    let mut files = files.into_iter();
    match (files.next(), files.next()) {
        (Some(file), None) => Ok(file),
        _ => Err(ForgeError::Io(format!(
            "job '{job}' expects exactly one file, fetcher returned {count}"
        ))),
    }
}
