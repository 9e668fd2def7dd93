//! # Artifact Store
//!
//! Path-addressed contract between stages. Every artifact location is a pure
//! function of `(Snapshot, ArtifactKey, chunk index)`:
//!
//! ```text
//! raw      {root}/{corpus}-raw-{date}/{name}/{site}-{date}-{name}.{ext}
//! derived  {root}/{corpus}-derived-{date}/{wiki}/{name}/{wiki}-{date}-{name}.{ext}
//! chunk i  same, with directory {name}-chunks and file suffix -chunk-{i:04}
//! ```
//!
//! `site` is the wiki id for Wikipedia and `wikidata` for Wikidata. The date is
//! the snapshot date of the key's corpus.
//!
//! A chunked artifact is present only once its `manifest.json` exists; the
//! fan-in step writes the manifest last. Before fan-out, a chunked stage
//! records the descriptors it is about to write in `plan.json`; chunk files
//! on disk are only trusted when that plan describes them.

use crate::config::{Snapshot, SnapshotDate};
use crate::formats;
use crate::partition::ChunkManifest;
use crate::primitives::{CHUNK_INDEX_WIDTH, MANIFEST_FILE_NAME, PLAN_FILE_NAME, TMP_SUFFIX};
use crate::types::ForgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// KEY COMPONENTS
// =============================================================================

/// Which dump an artifact derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Corpus {
    Wikipedia,
    Wikidata,
}

impl Corpus {
    /// Lowercase name used in directory names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Corpus::Wikipedia => "wikipedia",
            Corpus::Wikidata => "wikidata",
        }
    }
}

/// Downloaded input or pipeline output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Raw,
    Derived,
}

impl Layer {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Derived => "derived",
        }
    }
}

/// On-disk encoding of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Format {
    Csv,
    Jsonl,
    Text,
    Json,
}

impl Format {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Jsonl => "jsonl",
            Format::Text => "txt",
            Format::Json => "json",
        }
    }
}

// =============================================================================
// ARTIFACT KEY
// =============================================================================

/// Identifies an artifact independently of any snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub corpus: Corpus,
    pub layer: Layer,
    pub name: &'static str,
    pub format: Format,
    pub chunked: bool,
}

impl ArtifactKey {
    /// A single raw artifact.
    #[must_use]
    pub const fn raw(corpus: Corpus, name: &'static str, format: Format) -> Self {
        Self {
            corpus,
            layer: Layer::Raw,
            name,
            format,
            chunked: false,
        }
    }

    /// A single derived artifact.
    #[must_use]
    pub const fn derived(corpus: Corpus, name: &'static str, format: Format) -> Self {
        Self {
            corpus,
            layer: Layer::Derived,
            name,
            format,
            chunked: false,
        }
    }

    /// The chunked variant of this key.
    #[must_use]
    pub const fn chunks(self) -> Self {
        Self {
            chunked: true,
            ..self
        }
    }

    /// The single-file variant of this key.
    #[must_use]
    pub const fn gathered(self) -> Self {
        Self {
            chunked: false,
            ..self
        }
    }

    /// Snapshot date that versions this key.
    #[must_use]
    pub fn date(&self, snapshot: &Snapshot) -> SnapshotDate {
        match self.corpus {
            Corpus::Wikipedia => snapshot.wikipedia,
            Corpus::Wikidata => snapshot.wikidata,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}{}",
            self.corpus.as_str(),
            self.layer.as_str(),
            self.name,
            if self.chunked { "-chunks" } else { "" }
        )
    }
}

// =============================================================================
// ARTIFACT STORE
// =============================================================================

/// The artifact store. Stateless; the filesystem holds all state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStore;

impl ArtifactStore {
    /// Create a store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Directory holding an artifact (or its chunks).
    #[must_use]
    pub fn directory(&self, snapshot: &Snapshot, key: &ArtifactKey) -> PathBuf {
        let date = key.date(snapshot);
        let mut dir = snapshot
            .data_root
            .join(format!("{}-{}-{}", key.corpus.as_str(), key.layer.as_str(), date));
        if key.layer == Layer::Derived {
            dir.push(&snapshot.wiki);
        }
        if key.chunked {
            dir.push(format!("{}-chunks", key.name));
        } else {
            dir.push(key.name);
        }
        dir
    }

    /// Path of an artifact, or of chunk `chunk` of a chunked artifact.
    ///
    /// The chunk index is ignored for single-file keys.
    #[must_use]
    pub fn locate(&self, snapshot: &Snapshot, key: &ArtifactKey, chunk: Option<u32>) -> PathBuf {
        let dir = self.directory(snapshot, key);
        let stem = self.stem(snapshot, key);
        let file = match (key.chunked, chunk) {
            (true, Some(index)) => format!(
                "{stem}-chunk-{index:0width$}.{}",
                key.format.extension(),
                width = CHUNK_INDEX_WIDTH
            ),
            _ => format!("{stem}.{}", key.format.extension()),
        };
        dir.join(file)
    }

    /// Path of a chunked artifact's manifest.
    #[must_use]
    pub fn manifest_path(&self, snapshot: &Snapshot, key: &ArtifactKey) -> PathBuf {
        self.directory(snapshot, key).join(MANIFEST_FILE_NAME)
    }

    /// Whether a path exists as a regular file.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Whether an artifact is complete on disk.
    #[must_use]
    pub fn is_present(&self, snapshot: &Snapshot, key: &ArtifactKey) -> bool {
        if key.chunked {
            self.exists(&self.manifest_path(snapshot, key))
        } else {
            self.exists(&self.locate(snapshot, key, None))
        }
    }

    /// Where presence of `key` is checked: the manifest or the file itself.
    #[must_use]
    pub fn presence_path(&self, snapshot: &Snapshot, key: &ArtifactKey) -> PathBuf {
        if key.chunked {
            self.manifest_path(snapshot, key)
        } else {
            self.locate(snapshot, key, None)
        }
    }

    /// Ascending chunk indices found on disk for a chunked artifact.
    ///
    /// Temp files and names that do not follow the chunk pattern are ignored.
    pub fn list_chunks(&self, snapshot: &Snapshot, key: &ArtifactKey) -> Result<Vec<u32>, ForgeError> {
        let dir = self.directory(snapshot, key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}-chunk-", self.stem(snapshot, key));
        let suffix = format!(".{}", key.format.extension());

        let mut indices = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let digits = name
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(suffix.as_str()));
            let Some(digits) = digits else {
                continue;
            };
            if digits.len() < CHUNK_INDEX_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(index) = digits.parse::<u32>() {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    /// Persist a chunk manifest, marking the chunked artifact present.
    pub fn write_manifest(
        &self,
        snapshot: &Snapshot,
        key: &ArtifactKey,
        manifest: &ChunkManifest,
    ) -> Result<(), ForgeError> {
        formats::write_json_atomic(&self.manifest_path(snapshot, key), manifest)
    }

    /// Load a chunk manifest.
    pub fn read_manifest(&self, snapshot: &Snapshot, key: &ArtifactKey) -> Result<ChunkManifest, ForgeError> {
        formats::read_json(&self.manifest_path(snapshot, key))
    }

    /// Path of a chunked artifact's plan.
    #[must_use]
    pub fn plan_path(&self, snapshot: &Snapshot, key: &ArtifactKey) -> PathBuf {
        self.directory(snapshot, key).join(PLAN_FILE_NAME)
    }

    /// Record the descriptors a chunked stage is about to write.
    pub fn write_plan(&self, snapshot: &Snapshot, key: &ArtifactKey, plan: &ChunkManifest) -> Result<(), ForgeError> {
        formats::write_json_atomic(&self.plan_path(snapshot, key), plan)
    }

    /// The last recorded plan, if any.
    ///
    /// An unreadable plan is treated as absent, so every chunk is rebuilt.
    pub fn read_plan(&self, snapshot: &Snapshot, key: &ArtifactKey) -> Option<ChunkManifest> {
        let path = self.plan_path(snapshot, key);
        if !self.exists(&path) {
            return None;
        }
        match formats::read_json(&path) {
            Ok(plan) => Some(plan),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable chunk plan");
                None
            }
        }
    }

    fn stem(&self, snapshot: &Snapshot, key: &ArtifactKey) -> String {
        let site = match (key.layer, key.corpus) {
            (Layer::Raw, Corpus::Wikidata) => Corpus::Wikidata.as_str(),
            _ => snapshot.wiki.as_str(),
        };
        format!("{site}-{}-{}", key.date(snapshot), key.name)
    }
}

// =============================================================================
// TESTS
// =============================================================================
