use std::{collections::HashMap, sync::Arc};

use crate::{
    error::MdError,
    node::{NodeGraph, NodeId, NodePath},
    storage::{
        apply_metadata_writes, meta_key_array, node_prefix, ListableStorageTraits, MetadataWrite,
        WritableStorageTraits,
    },
};

use super::{
    array_sync_readable::view_step,
    array_view::permute,
    chunk_store::ChunkStore,
    data_type::encode_fixed_string,
    tile_presence::{PresenceState, TilePresence},
    windowed_io::{write_window, Window},
    ArrayCore, ArrayCreateError, ArrayError, ArrayShape, Element, ExtendedDataType, FillValue,
    MDArray,
};

impl MDArray {
    /// Write the window of `count` elements per dimension from `start`, `step` elements apart, from `bytes`, elements
    /// of `buffer_type` in row-major order.
    ///
    /// Advised chunks are dropped.
    ///
    /// # Errors
    /// Returns an [`MdError`] if
    ///  - the dataset is not open in update mode,
    ///  - the array has been deleted,
    ///  - the window is not within the array or `bytes` is not the size of the window,
    ///  - `buffer_type` cannot be converted to the data type of the array, or
    ///  - a chunk cannot be retrieved, encoded or stored.
    pub fn write(
        &self,
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
        buffer_type: &ExtendedDataType,
        bytes: &[u8],
    ) -> Result<(), MdError> {
        self.shared.check_update()?;
        let (path, core) = self.node()?;
        self.shared.ensure_presence(&path, &core)?;
        core.cache().advised = None;
        let store = self.shared.chunk_store(&path, &core);
        let shape = core.shape();
        let Some(mapping) = &self.view else {
            let window = Window::new(&shape, start, count, step)?;
            return Ok(write_window(&store, &window, buffer_type, bytes)?);
        };

        let step = view_step(mapping.dimensionality(), start, count, step)?;
        let base = mapping.base_window(start, count, &step);
        let window = Window::new(&shape, &base.start, &base.count, Some(&base.step))?;
        let bytes = permute(
            bytes.to_vec(),
            count,
            &mapping.base_order(),
            buffer_type.fixed_size().map_err(ArrayError::from)?,
        )?;
        Ok(write_window(&store, &window, buffer_type, &bytes)?)
    }

    /// Write a window of the array from elements of type `T`.
    ///
    /// # Errors
    /// See [`write`](MDArray::write).
    pub fn write_elements<T: Element>(
        &self,
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
        elements: &[T],
    ) -> Result<(), MdError> {
        self.write(
            start,
            count,
            step,
            &T::data_type(),
            bytemuck::cast_slice(elements),
        )
    }

    /// Write a window of a fixed-width string array.
    ///
    /// Strings longer than the string length of the array are truncated.
    ///
    /// # Errors
    /// Returns [`MdError::InvalidArgument`] if the array is not a string array, or another [`MdError`] as
    /// [`write`](MDArray::write).
    pub fn write_strings(
        &self,
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
        strings: &[&str],
    ) -> Result<(), MdError> {
        let data_type = self.data_type()?;
        let ExtendedDataType::String(string) = &data_type else {
            return Err(MdError::InvalidArgument(format!(
                "{} is not a string array",
                self.full_name()
            )));
        };
        let size = data_type.fixed_size().map_err(ArrayError::from)?;
        let mut bytes = vec![0u8; strings.len() * size];
        for (text, element) in strings.iter().zip(bytes.chunks_exact_mut(size)) {
            encode_fixed_string(text, string, element);
        }
        self.write(start, count, step, &data_type, &bytes)
    }

    /// Set the no-data value of the array, its fill value.
    ///
    /// `no_data` is in the in-memory representation of the data type of the array. [`None`] removes it, in which case
    /// elements which have never been written read as zero.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the array has been deleted, `no_data` is not
    /// the size of an element, or the store fails.
    pub fn set_no_data(&self, no_data: Option<FillValue>) -> Result<(), MdError> {
        self.shared.check_update()?;
        let (path, core) = self.node()?;
        if let Some(no_data) = &no_data {
            if no_data.size() != core.element_size() {
                return Err(
                    ArrayCreateError::InvalidFillValueSize(no_data.size(), core.element_size())
                        .into(),
                );
            }
        }
        let metadata = core.metadata_with_fill_value(no_data.as_ref());
        self.shared
            .storage
            .set(&meta_key_array(&path), &serde_json::to_vec_pretty(&metadata)?)?;
        core.set_fill_value(no_data);
        core.cache().advised = None;
        Ok(())
    }

    /// Grow the array to `new_sizes`.
    ///
    /// The dimensions of the array are grown too, and with them every other array referencing them.
    /// The metadata of all resized arrays is written atomically: a failure leaves every array with its former shape.
    ///
    /// # Errors
    /// Returns [`MdError::ReadOnly`] if the dataset is not open in update mode, or [`MdError::InvalidResize`] if
    ///  - the array is a view,
    ///  - `new_sizes` does not have the dimensionality of the array,
    ///  - a dimension referenced several times would get different sizes,
    ///  - a size is smaller than the current size,
    ///  - a dimension which is not growable would grow, or
    ///  - the chunk grid of a resized array would have too many chunks.
    pub fn resize(&self, new_sizes: &[u64]) -> Result<(), MdError> {
        self.shared.check_update()?;
        if self.view.is_some() {
            return Err(MdError::InvalidResize("Views cannot be resized".to_string()));
        }
        let mut graph = self.shared.graph.write();
        let core = self.core_in(&graph)?;
        let dimensions = graph
            .array(self.id)
            .map(|node| node.dimensions.clone())
            .unwrap_or_default();
        if new_sizes.len() != core.dimensionality() || dimensions.len() != new_sizes.len() {
            return Err(MdError::InvalidResize(
                "Not expected number of values in new_sizes".to_string(),
            ));
        }

        let mut grown: HashMap<NodeId, u64> = HashMap::new();
        for (dimension, new_size) in dimensions.iter().zip(new_sizes) {
            if grown.get(dimension).is_some_and(|size| size != new_size) {
                return Err(MdError::InvalidResize(
                    "Cannot resize a dimension referenced several times to different sizes"
                        .to_string(),
                ));
            }
            grown.insert(*dimension, *new_size);
        }
        for (dimension, new_size) in &grown {
            let size = graph.dimension(*dimension).map_or(0, |data| data.size);
            if *new_size < size {
                return Err(MdError::InvalidResize(
                    "Arrays cannot be shrunk".to_string(),
                ));
            }
            if *new_size > size && !graph.dimension(*dimension).is_some_and(|data| data.growable) {
                return Err(MdError::InvalidResize(format!(
                    "Dimension {} is not growable",
                    graph.get(*dimension).name
                )));
            }
        }
        for (axis, extent) in core.shape().iter().enumerate() {
            if new_sizes[axis] < *extent {
                return Err(MdError::InvalidResize(
                    "Arrays cannot be shrunk".to_string(),
                ));
            }
        }
        grown.retain(|dimension, new_size| {
            graph
                .dimension(*dimension)
                .is_some_and(|data| *new_size > data.size)
        });

        let resized = resized_arrays(&graph, self.id, new_sizes, &grown);
        if resized.is_empty() {
            return Ok(());
        }
        let mut writes: Vec<MetadataWrite> = Vec::with_capacity(resized.len());
        for array in &resized {
            if !array.core.supports_shape(&array.shape) {
                return Err(MdError::InvalidResize(format!(
                    "{} would have too many chunks with shape {:?}",
                    array.path, array.shape
                )));
            }
            let metadata = array.core.metadata_with_shape(&array.shape);
            writes.push((
                meta_key_array(&array.path),
                Some(serde_json::to_vec_pretty(&metadata)?),
            ));
        }
        for array in &resized {
            let store = self.shared.chunk_store(&array.path, &array.core);
            clear_padding(&store, &array.path, &array.core.shape())?;
        }
        apply_metadata_writes(self.shared.storage.as_ref(), &writes)?;

        for array in &resized {
            array.core.set_shape(array.shape.clone());
            array.core.invalidate_caches();
        }
        for (dimension, new_size) in &grown {
            if let Some(data) = graph.dimension_mut(*dimension) {
                data.size = *new_size;
            }
        }
        let paths: Vec<NodePath> = resized.iter().map(|array| array.path.clone()).collect();
        self.shared.erase_tile_presence(&paths);
        log::debug!("resized {} to {new_sizes:?}", graph.path(self.id));
        Ok(())
    }

    /// Build the tile presence cache of the array: a record of which of its chunks are stored.
    ///
    /// Reads of chunks which are not stored then do not access the store.
    /// The cache is stored in the cache store of the dataset, if any, otherwise in the `/.cache` group of the dataset.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the array has been deleted, the cache is not writable, or the store fails.
    pub fn cache_tile_presence(&self) -> Result<(), MdError> {
        let (path, core) = self.node()?;
        let presence = TilePresence::build(
            self.shared.presence_location(&path),
            &self.shared.storage,
            &path,
            &core,
        )?;
        core.cache().presence = PresenceState::Loaded(presence);
        Ok(())
    }
}

/// An array resized by a resize.
struct ResizedArray {
    path: NodePath,
    core: Arc<ArrayCore>,
    shape: ArrayShape,
}

/// The arrays resized by growing `array` to `new_sizes`, growing the dimensions of `grown`.
fn resized_arrays(
    graph: &NodeGraph,
    array: NodeId,
    new_sizes: &[u64],
    grown: &HashMap<NodeId, u64>,
) -> Vec<ResizedArray> {
    let mut ids = vec![array];
    for dimension in grown.keys() {
        for id in graph.arrays_referencing(*dimension) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    let mut resized = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(node) = graph.array(id) else {
            continue;
        };
        let current = node.core.shape();
        let shape: ArrayShape = if id == array {
            new_sizes.to_vec()
        } else {
            node.dimensions
                .iter()
                .zip(&current)
                .map(|(dimension, extent)| {
                    grown
                        .get(dimension)
                        .map_or(*extent, |size| (*size).max(*extent))
                })
                .collect()
        };
        if shape != current {
            resized.push(ResizedArray {
                path: graph.path(id),
                core: node.core.clone(),
                shape,
            });
        }
    }
    resized
}

/// Set the elements of the stored edge chunks of an array of `shape` lying beyond `shape` to the fill value.
///
/// These elements become part of the array when it grows.
fn clear_padding(store: &ChunkStore, path: &NodePath, shape: &[u64]) -> Result<(), ArrayError> {
    let core = store.core();
    let chunk_shape = core.chunk_shape();
    let edge = |chunk_indices: &[u64]| {
        itertools::izip!(chunk_indices, chunk_shape, shape)
            .any(|(index, chunk, extent)| (index + 1) * chunk > *extent)
    };
    let element_size = core.element_size();
    let fill = core
        .fill_value()
        .map_or_else(|| vec![0; element_size], |fill_value| fill_value.as_ne_bytes().to_vec());

    let prefix = node_prefix(path);
    for key in store.storage().list_prefix(&prefix)? {
        let Some(chunk_indices) = key.strip_prefix(&prefix).and_then(|relative| {
            core.chunk_key_encoding()
                .decode(relative, core.dimensionality())
        }) else {
            continue;
        };
        if !edge(&chunk_indices) {
            continue;
        }
        let Some(mut chunk) = store.retrieve_chunk_uncached(&chunk_indices)? else {
            continue;
        };
        let mut changed = false;
        for (linear, element) in chunk.chunks_exact_mut(element_size).enumerate() {
            let mut remainder = linear as u64;
            let mut outside = false;
            for axis in (0..chunk_shape.len()).rev() {
                let index = chunk_indices[axis] * chunk_shape[axis] + remainder % chunk_shape[axis];
                remainder /= chunk_shape[axis];
                outside |= index >= shape[axis];
            }
            if outside && element != fill.as_slice() {
                element.copy_from_slice(&fill);
                changed = true;
            }
        }
        if changed {
            store.store_chunk(&chunk_indices, chunk)?;
        }
    }
    Ok(())
}
