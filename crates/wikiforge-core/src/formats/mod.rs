//! # Artifact Formats
//!
//! File I/O shared by every stage.
//!
//! Every write goes through [`AtomicFile`]: bytes land in a `.tmp` sibling
//! and are renamed over the destination on commit. A reader therefore never
//! observes a partially written artifact, and an interrupted write leaves
//! nothing behind at the final path.
//!
//! - [`tabular`]: CSV tables with an explicit header row
//! - JSON Lines via [`JsonlWriter`] and [`visit_lines`]
//! - pretty JSON documents (manifests) via [`write_json_atomic`] / [`read_json`]

pub mod tabular;

pub use tabular::{
    CountsTable, TableRead, TableWriter, concat_tables, read_counts, read_rows, visit_records, visit_rows,
};

use crate::primitives::TMP_SUFFIX;
use crate::types::ForgeError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

// =============================================================================
// ATOMIC FILE
// =============================================================================

/// A file that only appears at its destination once committed.
#[derive(Debug)]
pub struct AtomicFile {
    dest: PathBuf,
    tmp: PathBuf,
    inner: BufWriter<File>,
    committed: bool,
}

impl AtomicFile {
    /// Open a temp sibling of `dest` for writing. Parent directories are
    /// created as needed.
    pub fn create(dest: &Path) -> Result<Self, ForgeError> {
        let tmp = tmp_path(dest)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&tmp)?;
        Ok(Self {
            dest: dest.to_path_buf(),
            tmp,
            inner: BufWriter::new(file),
            committed: false,
        })
    }

    /// Destination path.
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Flush, sync and rename onto the destination.
    pub fn commit(mut self) -> Result<(), ForgeError> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()?;
        fs::rename(&self.tmp, &self.dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// The in-progress sibling of `dest`.
pub fn tmp_path(dest: &Path) -> Result<PathBuf, ForgeError> {
    let mut name = dest
        .file_name()
        .ok_or_else(|| ForgeError::Io(format!("{} has no file name", dest.display())))?
        .to_os_string();
    name.push(TMP_SUFFIX);
    Ok(dest.with_file_name(name))
}

/// Remove `path`. Returns whether a file was there.
pub fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Copy `src` to `dest` atomically.
pub fn copy_atomic(src: &Path, dest: &Path) -> Result<u64, ForgeError> {
    let mut input = File::open(src)?;
    let mut out = AtomicFile::create(dest)?;
    let bytes = io::copy(&mut input, &mut out)?;
    out.commit()?;
    Ok(bytes)
}

// =============================================================================
// JSON
// =============================================================================

/// Write a pretty-printed JSON document atomically.
pub fn write_json_atomic<T: Serialize>(dest: &Path, value: &T) -> Result<(), ForgeError> {
    let mut out = AtomicFile::create(dest)?;
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.commit()
}

/// Read a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ForgeError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Writes one JSON value per line.
#[derive(Debug)]
pub struct JsonlWriter {
    out: AtomicFile,
    lines: u64,
}

impl JsonlWriter {
    pub fn create(dest: &Path) -> Result<Self, ForgeError> {
        Ok(Self {
            out: AtomicFile::create(dest)?,
            lines: 0,
        })
    }

    /// Append a serialized value.
    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<(), ForgeError> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Append a line that is already JSON.
    pub fn write_raw(&mut self, line: &str) -> Result<(), ForgeError> {
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Commit and return the number of lines written.
    pub fn commit(self) -> Result<u64, ForgeError> {
        let lines = self.lines;
        self.out.commit()?;
        Ok(lines)
    }
}

// =============================================================================
// LINES
// =============================================================================

/// Call `visit` with every line of a text file, numbered from 1.
///
/// Line terminators are stripped and invalid UTF-8 is replaced, so only I/O
/// errors and errors returned by `visit` stop the walk. Returning `Ok(false)`
/// from `visit` ends the walk early.
pub fn visit_lines<F>(path: &Path, mut visit: F) -> Result<(), ForgeError>
where
    F: FnMut(u64, &str) -> Result<bool, ForgeError>,
{
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        line_no += 1;
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if !visit(line_no, line)? {
            return Ok(());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
