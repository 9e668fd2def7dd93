//! Dump retrieval.
//!
//! The bundled fetcher reads a local mirror laid out as `{mirror}/{job}/`:
//!
//! ```text
//! articlesdump/      {wiki}-{date}-pages-articles*.jsonl
//! pagetable/         {wiki}-{date}-page.csv
//! pagepropstable/    {wiki}-{date}-page_props.csv
//! redirecttable/     {wiki}-{date}-redirect.csv
//! pageviewcomplete/  pageviews-{YYYYMM}*   (month before the Wikipedia date)
//! wikidatajson/      wikidata-{date}-all.json
//! ```

use crate::config::{DownloadJob, Snapshot};
use crate::types::ForgeError;
use std::path::{Path, PathBuf};

/// What to fetch and from where.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub job: DownloadJob,
    pub snapshot: &'a Snapshot,
    pub mirror: &'a str,
}

/// Locates the files of one download job.
pub trait DumpFetcher: Send + Sync {
    /// Local paths of the job's files, in processing order. Never empty on
    /// success.
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<PathBuf>, ForgeError>;
}

/// Reads dumps from a mirror directory on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorDirFetcher;

impl MirrorDirFetcher {
    /// Filesystem root of a mirror given as a `file://` URL or a plain path.
    pub fn mirror_root(mirror: &str) -> Result<PathBuf, ForgeError> {
        let lower = mirror.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Err(ForgeError::Configuration(format!(
                "remote mirror '{mirror}' is not supported; point --mirror-url at a local directory"
            )));
        }
        let path = mirror.strip_prefix("file://").unwrap_or(mirror);
        if path.is_empty() {
            return Err(ForgeError::Configuration("mirror path is empty".to_string()));
        }
        Ok(PathBuf::from(path))
    }

    fn listing(dir: &Path) -> Result<Vec<String>, ForgeError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| {
            ForgeError::Io(format!("cannot read mirror directory {}: {e}", dir.display()))
        })? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl DumpFetcher for MirrorDirFetcher {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<PathBuf>, ForgeError> {
        let root = Self::mirror_root(request.mirror)?;
        let dir = root.join(request.job.as_str());
        let wiki = &request.snapshot.wiki;
        let wp = request.snapshot.wikipedia;

        let selector: Box<dyn Fn(&str) -> bool> = match request.job {
            DownloadJob::PageTable => exact(format!("{wiki}-{wp}-page.csv")),
            DownloadJob::PagePropsTable => exact(format!("{wiki}-{wp}-page_props.csv")),
            DownloadJob::RedirectTable => exact(format!("{wiki}-{wp}-redirect.csv")),
            DownloadJob::WikidataJson => {
                exact(format!("wikidata-{}-all.json", request.snapshot.wikidata))
            }
            DownloadJob::ArticlesDump => {
                let prefix = format!("{wiki}-{wp}-pages-articles");
                Box::new(move |name: &str| name.starts_with(&prefix) && name.ends_with(".jsonl"))
            }
            DownloadJob::PageviewComplete => {
                let prefix = format!("pageviews-{}", wp.prior_month_stamp());
                Box::new(move |name: &str| name.starts_with(&prefix))
            }
        };

        let files: Vec<PathBuf> = Self::listing(&dir)?
            .into_iter()
            .filter(|name| selector(name))
            .map(|name| dir.join(name))
            .collect();

        if files.is_empty() {
            return Err(ForgeError::Io(format!(
                "job '{}' found no files in {}",
                request.job,
                dir.display()
            )));
        }
        tracing::debug!(job = %request.job, files = files.len(), "located dump files");
        Ok(files)
    }
}

fn exact(expected: String) -> Box<dyn Fn(&str) -> bool> {
    Box::new(move |name: &str| name == expected)
}
