//! The regular chunk grid.
//!
//! An array is partitioned into chunks of a fixed shape. The chunk containing the element at
//! `array_index` is `array_index[i] / chunk_shape[i]` on each axis. Edge chunks extend beyond the
//! array shape and their out-of-bounds elements are stored as the fill value.

use thiserror::Error;

use super::{ArrayIndices, ArrayShape};

/// A chunk grid error.
#[derive(Debug, Error)]
pub enum ChunkGridError {
    /// A chunk with a zero extent.
    #[error("Invalid content for chunks")]
    InvalidChunkShape,
    /// The number of bytes of a chunk is not addressable.
    #[error("Too large chunks")]
    TooLargeChunks,
    /// The number of chunks does not fit in 64 bits.
    #[error("Array {0} has more than 2^64 tiles")]
    TooManyTiles(String),
    /// The dimensionality of the chunk shape does not match the array.
    #[error("chunk shape {0:?} does not match the dimensionality of array shape {1:?}")]
    IncompatibleDimensionality(ArrayShape, ArrayShape),
}

/// A regular chunk grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegularChunkGrid {
    chunk_shape: ArrayShape,
}

impl RegularChunkGrid {
    /// Create a new regular chunk grid after validating it against an array.
    ///
    /// # Errors
    /// Returns a [`ChunkGridError`] if
    ///  - a chunk extent is zero,
    ///  - the dimensionality of `chunk_shape` and `array_shape` differ,
    ///  - the size of a chunk in bytes overflows `usize`, or
    ///  - the grid has more than 2^64 chunks.
    pub fn new(
        array_name: &str,
        chunk_shape: ArrayShape,
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<Self, ChunkGridError> {
        if chunk_shape.len() != array_shape.len() {
            return Err(ChunkGridError::IncompatibleDimensionality(
                chunk_shape,
                array_shape.to_vec(),
            ));
        }
        if chunk_shape.contains(&0) {
            return Err(ChunkGridError::InvalidChunkShape);
        }
        let mut chunk_bytes = element_size.max(1);
        for extent in &chunk_shape {
            chunk_bytes = usize::try_from(*extent)
                .ok()
                .and_then(|extent| chunk_bytes.checked_mul(extent))
                .ok_or(ChunkGridError::TooLargeChunks)?;
        }
        let grid = Self { chunk_shape };
        grid.num_chunks(array_shape)
            .ok_or_else(|| ChunkGridError::TooManyTiles(array_name.to_string()))?;
        Ok(grid)
    }

    /// Generate a chunk shape for an array of shape `array_shape`.
    ///
    /// The last two axes get the array extent capped to `block_size_limit`, and other axes get 1.
    /// A 1-D array uses its full extent.
    #[must_use]
    pub fn generate_chunk_shape(array_shape: &[u64], block_size_limit: u64) -> ArrayShape {
        let ndim = array_shape.len();
        if ndim == 1 {
            return vec![array_shape[0].max(1)];
        }
        array_shape
            .iter()
            .enumerate()
            .map(|(axis, extent)| {
                if axis + 2 >= ndim {
                    (*extent).clamp(1, block_size_limit.max(1))
                } else {
                    1
                }
            })
            .collect()
    }

    /// The chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// The number of elements of a chunk.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn chunk_num_elements(&self) -> usize {
        self.chunk_shape.iter().product::<u64>() as usize
    }

    /// The grid shape (i.e. number of chunks) for an array of shape `array_shape`.
    #[must_use]
    pub fn grid_shape(&self, array_shape: &[u64]) -> ArrayShape {
        array_shape
            .iter()
            .zip(&self.chunk_shape)
            .map(|(extent, chunk)| extent.div_ceil(*chunk))
            .collect()
    }

    /// The total number of chunks, or [`None`] if it overflows `u64`.
    #[must_use]
    pub fn num_chunks(&self, array_shape: &[u64]) -> Option<u64> {
        self.grid_shape(array_shape)
            .iter()
            .try_fold(1u64, |acc, extent| acc.checked_mul(*extent))
    }

    /// The chunk indices of the element at `array_indices`.
    #[must_use]
    pub fn chunk_indices(&self, array_indices: &[u64]) -> ArrayIndices {
        array_indices
            .iter()
            .zip(&self.chunk_shape)
            .map(|(index, chunk)| index / chunk)
            .collect()
    }

    /// The origin of the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_origin(&self, chunk_indices: &[u64]) -> ArrayIndices {
        chunk_indices
            .iter()
            .zip(&self.chunk_shape)
            .map(|(index, chunk)| index * chunk)
            .collect()
    }
}
