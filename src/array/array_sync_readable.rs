use crate::error::MdError;

use super::{
    array_view::permute,
    chunk_cache::ChunkCache,
    data_type::decode_fixed_string,
    windowed_io::{read_window, Window},
    ArrayError, Element, ExtendedDataType, MDArray,
};

impl MDArray {
    /// Read the window of `count` elements per dimension from `start`, `step` elements apart, as elements of
    /// `buffer_type`.
    ///
    /// `step` defaults to `1` on every dimension. A negative step reads a dimension backwards from `start`.
    /// The returned bytes are dense, in row-major order and in the in-memory representation of `buffer_type`.
    ///
    /// # Errors
    /// Returns an [`MdError`] if
    ///  - the array has been deleted,
    ///  - the window is not within the array,
    ///  - the data type of the array cannot be converted to `buffer_type`, or
    ///  - a chunk cannot be retrieved or decoded.
    pub fn read(
        &self,
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
        buffer_type: &ExtendedDataType,
    ) -> Result<Vec<u8>, MdError> {
        let (path, core) = self.node()?;
        self.shared.ensure_presence(&path, &core)?;
        let store = self.shared.chunk_store(&path, &core);
        let shape = core.shape();
        let Some(mapping) = &self.view else {
            let window = Window::new(&shape, start, count, step)?;
            return Ok(read_window(&store, &window, buffer_type)?);
        };

        let dimensionality = mapping.dimensionality();
        let step = view_step(dimensionality, start, count, step)?;
        let base = mapping.base_window(start, count, &step);
        let window = Window::new(&shape, &base.start, &base.count, Some(&base.step))?;
        let bytes = read_window(&store, &window, buffer_type)?;
        let base_count: Vec<u64> = mapping
            .base_order()
            .into_iter()
            .map(|axis| count[axis])
            .collect();
        Ok(permute(
            bytes,
            &base_count,
            &mapping.read_permutation(),
            buffer_type.fixed_size().map_err(ArrayError::from)?,
        )?)
    }

    /// Read a window of the array as elements of type `T`.
    ///
    /// # Errors
    /// See [`read`](MDArray::read).
    pub fn read_elements<T: Element>(
        &self,
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
    ) -> Result<Vec<T>, MdError> {
        let bytes = self.read(start, count, step, &T::data_type())?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Read a window of a fixed-width string array.
    ///
    /// Strings are truncated at their first nul character.
    ///
    /// # Errors
    /// Returns [`MdError::InvalidArgument`] if the array is not a string array, or another [`MdError`] as
    /// [`read`](MDArray::read).
    pub fn read_strings(
        &self,
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
    ) -> Result<Vec<String>, MdError> {
        let data_type = self.data_type()?;
        let ExtendedDataType::String(string) = &data_type else {
            return Err(MdError::InvalidArgument(format!(
                "{} is not a string array",
                self.full_name()
            )));
        };
        let size = data_type.fixed_size().map_err(ArrayError::from)?;
        let bytes = self.read(start, count, step, &data_type)?;
        Ok(bytes
            .chunks_exact(size)
            .map(|element| decode_fixed_string(element, string))
            .collect())
    }

    /// Advise that the window of `count` elements per dimension from `start` is about to be read.
    ///
    /// The chunks intersecting the window are retrieved and kept until the next write, resize or advice.
    /// Reads of those chunks are then served without accessing the store. Without `start` and `count`, the whole
    /// array is advised.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the array has been deleted, the window is not within the array, or a chunk cannot be
    /// retrieved.
    pub fn advise_read(&self, start: Option<&[u64]>, count: Option<&[u64]>) -> Result<(), MdError> {
        let (path, core) = self.node()?;
        self.shared.ensure_presence(&path, &core)?;
        let shape = core.shape();
        let view_shape = self
            .view
            .as_ref()
            .map_or_else(|| shape.clone(), |mapping| mapping.shape(&shape));
        let start = start.map_or_else(|| vec![0; view_shape.len()], <[u64]>::to_vec);
        let count = count.map_or_else(|| view_shape.clone(), <[u64]>::to_vec);
        let (start, count) = match &self.view {
            None => (start, count),
            Some(mapping) => {
                let step = view_step(mapping.dimensionality(), &start, &count, None)?;
                let base = mapping.base_window(&start, &count, &step);
                (base.start, base.count)
            }
        };
        let window = Window::new(&shape, &start, &count, None)?;

        if let Some(advised) = &core.cache().advised {
            if advised.contains(&start, &count) {
                return Ok(());
            }
        }
        core.cache().advised = None;

        let store = self.shared.chunk_store(&path, &core);
        let chunk_shape = core.chunk_shape();
        let ranges: Vec<(u64, u64)> = itertools::izip!(&start, &count, chunk_shape)
            .map(|(start, count, chunk)| (start / chunk, (start + count).div_ceil(*chunk)))
            .collect();
        let mut cache = ChunkCache::new(start.clone(), count.clone());
        if window.num_elements() != Some(0) && ranges.iter().all(|(first, end)| first < end) {
            let mut chunk_indices: Vec<u64> = ranges.iter().map(|(first, _)| *first).collect();
            'chunks: loop {
                cache.insert(chunk_indices.clone(), store.retrieve_chunk(&chunk_indices)?);
                for axis in (0..ranges.len()).rev() {
                    chunk_indices[axis] += 1;
                    if chunk_indices[axis] < ranges[axis].1 {
                        continue 'chunks;
                    }
                    chunk_indices[axis] = ranges[axis].0;
                }
                break;
            }
        }
        log::debug!(
            "advised {} chunks ({} bytes) of {path}",
            cache.len(),
            cache.size()
        );
        core.cache().advised = Some(cache);
        Ok(())
    }
}

/// The step of a view window, validating the dimensionality of the window.
pub(super) fn view_step(
    dimensionality: usize,
    start: &[u64],
    count: &[u64],
    step: Option<&[i64]>,
) -> Result<Vec<i64>, ArrayError> {
    for len in [start.len(), count.len(), step.map_or(dimensionality, <[i64]>::len)] {
        if len != dimensionality {
            return Err(ArrayError::IncompatibleDimensionality(len, dimensionality));
        }
    }
    Ok(step.map_or_else(|| vec![1; dimensionality], <[i64]>::to_vec))
}
