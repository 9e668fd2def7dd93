//! # Chunk Partitioner
//!
//! Splits an ordered input of `input_size` units (lines, entities, files)
//! into contiguous, disjoint chunks and describes them in a [`ChunkManifest`].
//!
//! Chunk boundaries depend only on the input size and the chunk size/count.
//! An entity cap then clips the ranges: chunks starting at or beyond the cap
//! are dropped, and the chunk straddling the cap ends exactly at it. Chunk
//! indices are therefore stable for a given `(snapshot, cap, chunking)`.

use crate::config::EntityCap;
use crate::formats::remove_if_present;
use crate::types::ForgeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// RANGES
// =============================================================================

/// Half-open range `[start, end)` of input units owned by one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    /// Number of units in the range.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Split `input_size` units into `chunk_count` chunks of `ceil(size / count)`.
///
/// Fewer chunks come back when the input is small or the cap drops them.
pub fn partition(input_size: u64, chunk_count: usize, cap: EntityCap) -> Result<Vec<ChunkRange>, ForgeError> {
    if chunk_count == 0 {
        return Err(ForgeError::InvalidPartition("chunk count must be positive".to_string()));
    }
    let chunk_size = input_size.div_ceil(chunk_count as u64).max(1);
    partition_fixed(input_size, chunk_size, cap)
}

/// Split `input_size` units into chunks of exactly `chunk_size` (the last may be
/// shorter).
pub fn partition_fixed(input_size: u64, chunk_size: u64, cap: EntityCap) -> Result<Vec<ChunkRange>, ForgeError> {
    if chunk_size == 0 {
        return Err(ForgeError::InvalidPartition("chunk size must be positive".to_string()));
    }
    let limit = cap.clamp(input_size);

    let mut ranges = Vec::new();
    let mut start = 0u64;
    let mut index = 0u32;
    while start < limit {
        let end = start.saturating_add(chunk_size).min(input_size);
        ranges.push(ChunkRange {
            index,
            start,
            end: end.min(limit),
        });
        start = end;
        index = index
            .checked_add(1)
            .ok_or_else(|| ForgeError::InvalidPartition("too many chunks".to_string()))?;
    }
    Ok(ranges)
}

// =============================================================================
// MANIFEST
// =============================================================================

/// Work order for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub index: u32,
    pub start: u64,
    pub end: u64,
    /// Most entities this chunk may emit; `None` when uncapped.
    pub budget: Option<u64>,
    /// Input file, for chunks mapped one-to-one onto input files.
    pub input: Option<PathBuf>,
    /// Every path the chunk writes.
    pub outputs: Vec<PathBuf>,
}

impl ChunkDescriptor {
    /// The range this chunk owns.
    #[must_use]
    pub const fn range(&self) -> ChunkRange {
        ChunkRange {
            index: self.index,
            start: self.start,
            end: self.end,
        }
    }

    /// The output at position `slot`, as listed when the manifest was built.
    pub fn output(&self, slot: usize) -> Result<&PathBuf, ForgeError> {
        self.outputs.get(slot).ok_or_else(|| {
            ForgeError::InvalidPartition(format!("chunk {} has no output #{slot}", self.index))
        })
    }
}

/// Ordered chunk descriptors of one chunked stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub chunks: Vec<ChunkDescriptor>,
}

impl ChunkManifest {
    /// Describe ranged chunks. `outputs(i)` gives the paths chunk `i` writes.
    ///
    /// The budget of a ranged chunk is its length when a cap is set.
    pub fn for_ranges<F>(ranges: &[ChunkRange], cap: EntityCap, mut outputs: F) -> Self
    where
        F: FnMut(u32) -> Vec<PathBuf>,
    {
        let chunks = ranges
            .iter()
            .map(|range| ChunkDescriptor {
                index: range.index,
                start: range.start,
                end: range.end,
                budget: cap.limit().map(|_| range.len()),
                input: None,
                outputs: outputs(range.index),
            })
            .collect();
        Self { chunks }
    }

    /// Describe one chunk per input file, in the given order.
    ///
    /// Every chunk receives the full cap as its budget.
    pub fn for_inputs<F>(inputs: &[PathBuf], cap: EntityCap, mut outputs: F) -> Self
    where
        F: FnMut(u32) -> Vec<PathBuf>,
    {
        let chunks = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let index = i as u32;
                ChunkDescriptor {
                    index,
                    start: i as u64,
                    end: i as u64 + 1,
                    budget: cap.limit(),
                    input: Some(input.clone()),
                    outputs: outputs(index),
                }
            })
            .collect();
        Self { chunks }
    }

    /// A manifest over the same chunks that reads each chunk's first output
    /// and writes `outputs(i)`. Used by stages that consume another stage's
    /// chunks one-to-one.
    pub fn follow_on<F>(&self, mut outputs: F) -> Self
    where
        F: FnMut(u32) -> Vec<PathBuf>,
    {
        let chunks = self
            .chunks
            .iter()
            .map(|chunk| ChunkDescriptor {
                index: chunk.index,
                start: chunk.start,
                end: chunk.end,
                budget: chunk.budget,
                input: chunk.outputs.first().cloned(),
                outputs: outputs(chunk.index),
            })
            .collect();
        Self { chunks }
    }

    /// The same chunks, keeping only the output at `slot`. Each output key of
    /// a multi-output stage is persisted with its own projection.
    #[must_use]
    pub fn for_slot(&self, slot: usize) -> Self {
        let chunks = self
            .chunks
            .iter()
            .map(|chunk| ChunkDescriptor {
                outputs: chunk.outputs.get(slot).cloned().into_iter().collect(),
                ..chunk.clone()
            })
            .collect();
        Self { chunks }
    }

    /// Delete the outputs of every chunk that `plan` does not describe
    /// exactly, returning the indices that had files removed.
    ///
    /// `plan` is the manifest the files on disk were written under. A chunk
    /// clipped by an earlier cap differs in `end` or `budget` and is dropped,
    /// so only chunks written under identical descriptors survive for reuse.
    pub fn retire_stale(&self, plan: Option<&ChunkManifest>) -> Result<Vec<u32>, ForgeError> {
        let mut retired = Vec::new();
        for chunk in &self.chunks {
            let planned = plan
                .and_then(|p| p.chunks.iter().find(|c| c.index == chunk.index))
                .is_some_and(|c| c == chunk);
            if planned {
                continue;
            }
            let mut removed = false;
            for path in &chunk.outputs {
                removed |= remove_if_present(path)?;
            }
            if removed {
                retired.push(chunk.index);
            }
        }
        Ok(retired)
    }

    /// Chunk indices, ascending.
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        self.chunks.iter().map(|c| c.index).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Every output path, in chunk order.
    #[must_use]
    pub fn outputs_at(&self, slot: usize) -> Vec<PathBuf> {
        self.chunks
            .iter()
            .filter_map(|c| c.outputs.get(slot).cloned())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
