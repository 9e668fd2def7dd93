//! CSV tables.
//!
//! Tables always carry a header row. Readers match columns by header name,
//! so extra columns in an input are ignored and column order does not matter.
//! A row that fails to deserialize is a transient record error: it is
//! counted and skipped. I/O errors are fatal.

use super::AtomicFile;
use crate::types::{ForgeError, RecordTally};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// WRITER
// =============================================================================

/// Atomically written CSV table.
pub struct TableWriter {
    writer: csv::Writer<AtomicFile>,
    rows: u64,
}

impl TableWriter {
    /// Start a table at `dest` with the given header.
    pub fn create(dest: &Path, columns: &[&str]) -> Result<Self, ForgeError> {
        let file = AtomicFile::create(dest)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(columns)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append a serialized row. Field order must match the header.
    pub fn write_row<T: Serialize>(&mut self, row: &T) -> Result<(), ForgeError> {
        self.writer.serialize(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Append a row of raw fields.
    pub fn write_record<I, F>(&mut self, record: I) -> Result<(), ForgeError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        self.writer.write_record(record)?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, header excluded.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and commit; returns the number of rows written.
    pub fn commit(self) -> Result<u64, ForgeError> {
        let rows = self.rows;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| ForgeError::Io(e.error().to_string()))?;
        file.commit()?;
        Ok(rows)
    }
}

// =============================================================================
// READERS
// =============================================================================

/// Rows read from a table plus the tally of good and skipped rows.
#[derive(Debug)]
pub struct TableRead<T> {
    pub rows: Vec<T>,
    pub tally: RecordTally,
}

/// Stream every row of a table through `visit`.
///
/// Malformed rows are skipped and counted. The returned tally counts
/// visited rows as records.
pub fn visit_rows<T, F>(path: &Path, mut visit: F) -> Result<RecordTally, ForgeError>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), ForgeError>,
{
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut tally = RecordTally::default();
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => {
                visit(row)?;
                tally.record();
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                let skipped = ForgeError::TransientRecord {
                    line: idx as u64 + 2,
                    reason: e.to_string(),
                };
                tracing::debug!(path = %path.display(), error = %skipped, "skipping row");
                tally.skip();
            }
        }
    }
    Ok(tally)
}

/// Read every well-formed row of a table.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<TableRead<T>, ForgeError> {
    let mut rows = Vec::new();
    let tally = visit_rows(path, |row: T| {
        rows.push(row);
        Ok(())
    })?;
    Ok(TableRead { rows, tally })
}

/// Walk the raw records of a table whose columns are only known at run time.
///
/// Returns the header. Records may be shorter or longer than the header;
/// `visit` decides what to do with them.
pub fn visit_records<F>(path: &Path, mut visit: F) -> Result<Vec<String>, ForgeError>
where
    F: FnMut(&[String], &csv::StringRecord) -> Result<(), ForgeError>,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        visit(&header, &record)?;
    }
    Ok(header)
}

/// A table keyed by an integer first column with unsigned value columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountsTable {
    /// Value column names (the key column excluded).
    pub columns: Vec<String>,
    pub rows: BTreeMap<i64, Vec<u64>>,
    pub tally: RecordTally,
}

impl CountsTable {
    /// Value of `column` for `key`, 0 when either is missing.
    #[must_use]
    pub fn value(&self, key: i64, column: &str) -> u64 {
        let Some(slot) = self.columns.iter().position(|c| c == column) else {
            return 0;
        };
        self.rows
            .get(&key)
            .and_then(|values| values.get(slot))
            .copied()
            .unwrap_or(0)
    }
}

/// Read a [`CountsTable`]. Rows with a non-integer field or the wrong width
/// are skipped.
pub fn read_counts(path: &Path) -> Result<CountsTable, ForgeError> {
    let mut rows = BTreeMap::new();
    let mut tally = RecordTally::default();
    let header = visit_records(path, |header, record| {
        if record.len() != header.len() {
            tally.skip();
            return Ok(());
        }
        let mut fields = record.iter();
        let key = fields.next().and_then(|f| f.parse::<i64>().ok());
        let values: Option<Vec<u64>> = fields.map(|f| f.parse::<u64>().ok()).collect();
        match (key, values) {
            (Some(key), Some(values)) => {
                rows.insert(key, values);
                tally.record();
            }
            _ => tally.skip(),
        }
        Ok(())
    })?;
    Ok(CountsTable {
        columns: header.into_iter().skip(1).collect(),
        rows,
        tally,
    })
}

/// Concatenate tables with identical headers into `dest`, in input order.
///
/// `columns` is written as the header even when `inputs` is empty.
pub fn concat_tables(inputs: &[PathBuf], dest: &Path, columns: &[&str]) -> Result<u64, ForgeError> {
    let mut out = TableWriter::create(dest, columns)?;
    for input in inputs {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(input)?;
        let header = reader.headers()?.clone();
        if header.iter().ne(columns.iter().copied()) {
            return Err(ForgeError::Serialization(format!(
                "{} has columns {:?}, expected {:?}",
                input.display(),
                header.iter().collect::<Vec<_>>(),
                columns
            )));
        }
        let mut record = csv::ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            out.write_record(&record)?;
        }
    }
    out.commit()
}

// =============================================================================
// TESTS
// =============================================================================
