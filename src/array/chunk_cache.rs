//! The chunk cache of an advised read.

use std::collections::HashMap;

use super::{ArrayIndices, ArrayShape};

/// Decoded chunks intersecting a region announced with [`advise_read`](super::MDArray::advise_read).
///
/// A chunk which is not stored is cached as [`None`].
#[derive(Debug, Default)]
pub(crate) struct ChunkCache {
    start: ArrayIndices,
    count: ArrayShape,
    chunks: HashMap<ArrayIndices, Option<Vec<u8>>>,
    size: usize,
}

impl ChunkCache {
    pub(crate) fn new(start: ArrayIndices, count: ArrayShape) -> Self {
        Self {
            start,
            count,
            chunks: HashMap::new(),
            size: 0,
        }
    }

    /// Retrieve a chunk from the cache. Returns [`None`] if the chunk is not cached.
    pub(crate) fn get(&self, chunk_indices: &[u64]) -> Option<&Option<Vec<u8>>> {
        self.chunks.get(chunk_indices)
    }

    /// Insert a chunk into the cache.
    pub(crate) fn insert(&mut self, chunk_indices: ArrayIndices, chunk: Option<Vec<u8>>) {
        self.size += chunk.as_ref().map_or(0, Vec::len);
        if let Some(Some(previous)) = self.chunks.insert(chunk_indices, chunk) {
            self.size -= previous.len();
        }
    }

    /// Returns true if the region starting at `start` with `count` elements per dimension is within the advised region.
    pub(crate) fn contains(&self, start: &[u64], count: &[u64]) -> bool {
        start.len() == self.start.len()
            && itertools::izip!(start, count, &self.start, &self.count).all(
                |(start, count, advised_start, advised_count)| {
                    *start >= *advised_start && start + count <= advised_start + advised_count
                },
            )
    }

    /// Return the number of chunks in the cache.
    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Return the total size of the decoded chunks in the cache.
    pub(crate) fn size(&self) -> usize {
        self.size
    }
}
