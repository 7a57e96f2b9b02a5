//! The tile presence cache.
//!
//! The tile presence of an array records which of its chunks are stored, so reads skip requests for absent chunks.
//! It is persisted as a `UInt8` array with one element per chunk, either in a hidden `.cache` group of the store of
//! the array or at the root of a separate cache store.
//!
//! The cache is purely an optimisation. A cache which does not match the chunk grid of its array is ignored,
//! and the cache of an array is erased whenever the array is resized, renamed or deleted.

use std::sync::Arc;

use serde_json::json;

use crate::{
    config::global_config,
    metadata::{ArrayMetadata, Attributes, GroupMetadata},
    node::NodePath,
    storage::{
        meta_key_array, meta_key_attributes, meta_key_group, node_prefix, ListableStorageTraits,
        ReadableStorageTraits, ReadableWritableListableStorage, StorageError, StoreKey,
        WritableStorageTraits,
    },
};

use super::{
    array_core::ArrayCore,
    chunk_store::ChunkStore,
    windowed_io::{read_window, write_window, Window},
    ArrayError, ArrayShape, ExtendedDataType, NumericDataType,
};

/// The attribute of a tile presence array summarising its content.
pub(crate) const FILLING_STATUS_ATTRIBUTE: &str = "filling_status";

/// The hidden group holding tile presence arrays in the store of their arrays.
const CACHE_GROUP: &str = ".cache";

/// The largest chunk extent of a tile presence array.
const MAX_CHUNK_EXTENT: u64 = 256;

/// The tile presence of an array, as known by its handle.
#[derive(Debug, Default)]
pub(crate) enum PresenceState {
    /// Not looked up yet.
    #[default]
    Unknown,
    /// There is no usable cache.
    Absent,
    Loaded(TilePresence),
}

/// Where the tile presence array of an array lives.
#[derive(Clone)]
pub(crate) struct PresenceLocation {
    storage: ReadableWritableListableStorage,
    path: NodePath,
    in_cache_group: bool,
    writable: bool,
}

impl PresenceLocation {
    /// The location of the tile presence array of the array at `array_path`.
    ///
    /// The cache is kept in `cache_storage` if there is one, otherwise in the `.cache` group of `storage`.
    /// It is written only if the dataset is open in update mode or has a separate cache store.
    pub(crate) fn new(
        storage: &ReadableWritableListableStorage,
        cache_storage: Option<&ReadableWritableListableStorage>,
        array_path: &NodePath,
        update: bool,
    ) -> Self {
        let name = format!("{}_tile_presence", array_path.as_str().replace('/', "_"));
        match cache_storage {
            Some(cache_storage) => Self {
                storage: cache_storage.clone(),
                path: NodePath::root().child(&name),
                in_cache_group: false,
                writable: true,
            },
            None => Self {
                storage: storage.clone(),
                path: NodePath::root().child(CACHE_GROUP).child(&name),
                in_cache_group: true,
                writable: update,
            },
        }
    }

    pub(crate) const fn path(&self) -> &NodePath {
        &self.path
    }

    pub(crate) const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Erase the tile presence array.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store fails.
    pub(crate) fn erase(&self) -> Result<(), StorageError> {
        if !self.writable {
            return Ok(());
        }
        self.storage.erase_prefix(&node_prefix(&self.path))
    }
}

/// A loaded tile presence array.
pub(crate) struct TilePresence {
    location: PresenceLocation,
    core: Box<ArrayCore>,
    grid_shape: ArrayShape,
    present: Vec<u8>,
}

impl std::fmt::Debug for TilePresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilePresence")
            .field("path", &self.location.path)
            .field("grid_shape", &self.grid_shape)
            .finish_non_exhaustive()
    }
}

fn presence_metadata(grid_shape: &[u64]) -> Result<ArrayMetadata, serde_json::Error> {
    let chunks: Vec<u64> = grid_shape
        .iter()
        .map(|extent| (*extent).clamp(1, MAX_CHUNK_EXTENT))
        .collect();
    serde_json::from_value(json!({
        "zarr_format": 2,
        "shape": grid_shape,
        "chunks": chunks,
        "dtype": "|u1",
        "compressor": null,
        "fill_value": null,
        "filters": null,
        "order": "C",
    }))
}

fn invalid_metadata(key: &StoreKey, err: impl std::fmt::Display) -> StorageError {
    StorageError::InvalidMetadata(key.clone(), err.to_string())
}

fn presence_core(path: &NodePath, metadata: ArrayMetadata) -> Result<ArrayCore, StorageError> {
    let core = ArrayCore::new(path.as_str(), metadata)
        .map_err(|err| invalid_metadata(&meta_key_array(path), err))?;
    core.cache().presence = PresenceState::Absent;
    Ok(core)
}

fn linear_index(grid_shape: &[u64], chunk_indices: &[u64]) -> Option<usize> {
    if chunk_indices.len() != grid_shape.len() {
        return None;
    }
    let mut index: u64 = 0;
    for (chunk, extent) in chunk_indices.iter().zip(grid_shape) {
        if chunk >= extent {
            return None;
        }
        index = index * extent + chunk;
    }
    usize::try_from(index).ok()
}

impl TilePresence {
    /// Build the tile presence array of an array by listing its stored chunks.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the cache is not writable or the store fails.
    pub(crate) fn build(
        location: PresenceLocation,
        storage: &ReadableWritableListableStorage,
        array_path: &NodePath,
        array: &ArrayCore,
    ) -> Result<Self, ArrayError> {
        if !location.writable {
            return Err(StorageError::ReadOnly.into());
        }
        let grid_shape = array.chunk_grid().grid_shape(&array.shape());
        let window = Window::new(&grid_shape, &vec![0; grid_shape.len()], &grid_shape, None)?;
        let num_chunks = window
            .num_elements()
            .ok_or_else(|| ArrayError::WindowTooLarge(grid_shape.clone()))?;
        let mut present = vec![0u8; num_chunks];

        let prefix = node_prefix(array_path);
        for key in storage.list_prefix(&prefix)? {
            if let Some(index) = key
                .strip_prefix(&prefix)
                .and_then(|relative| {
                    array
                        .chunk_key_encoding()
                        .decode(relative, array.dimensionality())
                })
                .and_then(|chunk_indices| linear_index(&grid_shape, &chunk_indices))
            {
                present[index] = 1;
            }
        }
        let num_present = present.iter().filter(|present| **present != 0).count();
        let filling_status = if num_present == 0 {
            "no_tile_present"
        } else if num_present == num_chunks {
            "all_tiles_present"
        } else {
            "some_tiles_missing"
        };
        log::debug!(
            "tile presence of {array_path}: {num_present} of {num_chunks} chunks ({filling_status})"
        );

        let path = location.path.clone();
        let metadata_key = meta_key_array(&path);
        let metadata =
            presence_metadata(&grid_shape).map_err(|err| invalid_metadata(&metadata_key, err))?;
        let metadata_bytes =
            serde_json::to_vec_pretty(&metadata).map_err(|err| invalid_metadata(&metadata_key, err))?;
        let mut attributes = Attributes::new();
        attributes.insert(FILLING_STATUS_ATTRIBUTE.to_string(), filling_status.into());
        let attributes_key = meta_key_attributes(&path);
        let attributes_bytes = serde_json::to_vec_pretty(&attributes)
            .map_err(|err| invalid_metadata(&attributes_key, err))?;

        let cache_storage = &location.storage;
        cache_storage.erase_prefix(&node_prefix(&path))?;
        if location.in_cache_group {
            let group_key = meta_key_group(&NodePath::root().child(CACHE_GROUP));
            if !cache_storage.exists(&group_key)? {
                let group = serde_json::to_vec_pretty(&GroupMetadata::default())
                    .map_err(|err| invalid_metadata(&group_key, err))?;
                cache_storage.set(&group_key, &group)?;
            }
        }
        cache_storage.set(&metadata_key, &metadata_bytes)?;
        cache_storage.set(&attributes_key, &attributes_bytes)?;

        let core = presence_core(&path, metadata)?;
        let config = global_config().clone();
        let store = ChunkStore::new(cache_storage.as_ref(), &path, &core, &config);
        write_window(
            &store,
            &window,
            &ExtendedDataType::from(NumericDataType::UInt8),
            &present,
        )?;
        Ok(Self {
            location,
            core: Box::new(core),
            grid_shape,
            present,
        })
    }

    /// Load the tile presence array of `array`.
    ///
    /// Returns [`None`] if there is no tile presence array, or if it does not match the chunk grid of `array`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the store fails.
    pub(crate) fn load(
        location: PresenceLocation,
        array: &ArrayCore,
    ) -> Result<Option<Self>, ArrayError> {
        let path = location.path.clone();
        let metadata_key = meta_key_array(&path);
        let Some(bytes) = location.storage.get(&metadata_key)? else {
            return Ok(None);
        };
        let grid_shape = array.chunk_grid().grid_shape(&array.shape());
        let metadata = match serde_json::from_slice::<ArrayMetadata>(&bytes) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("tile presence cache {path} is ignored: {err}");
                return Ok(None);
            }
        };
        let expected = presence_metadata(&grid_shape).map_err(|err| invalid_metadata(&metadata_key, err))?;
        if metadata.shape != expected.shape
            || metadata.chunks != expected.chunks
            || !matches!(metadata.dtype.as_str(), Some("|u1" | "<u1" | ">u1"))
        {
            log::warn!(
                "tile presence cache {path} is ignored: it does not match the chunk grid {grid_shape:?}"
            );
            return Ok(None);
        }
        let core = match presence_core(&path, metadata) {
            Ok(core) => core,
            Err(err) => {
                log::warn!("tile presence cache {path} is ignored: {err}");
                return Ok(None);
            }
        };
        let window = Window::new(&grid_shape, &vec![0; grid_shape.len()], &grid_shape, None)?;
        let config = global_config().clone();
        let store = ChunkStore::new(location.storage.as_ref(), &path, &core, &config);
        let present = read_window(&store, &window, &ExtendedDataType::from(NumericDataType::UInt8))?;
        Ok(Some(Self {
            location,
            core: Box::new(core),
            grid_shape,
            present,
        }))
    }

    /// Returns true if the chunk at `chunk_indices` may be stored.
    ///
    /// A chunk outside of the cached grid is assumed present.
    pub(crate) fn is_present(&self, chunk_indices: &[u64]) -> bool {
        linear_index(&self.grid_shape, chunk_indices).map_or(true, |index| self.present[index] != 0)
    }

    /// Record whether the chunk at `chunk_indices` is stored.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the cache cannot be updated in its store.
    pub(crate) fn set_present(&mut self, chunk_indices: &[u64], present: bool) -> Result<(), ArrayError> {
        let Some(index) = linear_index(&self.grid_shape, chunk_indices) else {
            return Ok(());
        };
        let value = u8::from(present);
        if self.present[index] == value {
            return Ok(());
        }
        self.present[index] = value;
        if self.location.writable {
            let window = Window::new(
                &self.grid_shape,
                chunk_indices,
                &vec![1; chunk_indices.len()],
                None,
            )?;
            let config = global_config().clone();
            let store = ChunkStore::new(
                self.location.storage.as_ref(),
                &self.location.path,
                &self.core,
                &config,
            );
            write_window(
                &store,
                &window,
                &ExtendedDataType::from(NumericDataType::UInt8),
                &[value],
            )?;
        }
        Ok(())
    }
}

/// Look up the tile presence of `array` if it has not been looked up yet.
///
/// # Errors
/// Returns an [`ArrayError`] if the store fails.
pub(crate) fn ensure_presence(
    array: &Arc<ArrayCore>,
    location: impl FnOnce() -> PresenceLocation,
) -> Result<(), ArrayError> {
    if !matches!(array.cache().presence, PresenceState::Unknown) {
        return Ok(());
    }
    let state = match TilePresence::load(location(), array)? {
        Some(presence) => PresenceState::Loaded(presence),
        None => PresenceState::Absent,
    };
    let mut cache = array.cache();
    if matches!(cache.presence, PresenceState::Unknown) {
        cache.presence = state;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;

    fn array_core() -> ArrayCore {
        let metadata = json!({
            "zarr_format": 2, "shape": [10, 10], "chunks": [4, 4], "dtype": "<i2",
            "compressor": null, "fill_value": 0, "filters": null, "order": "C",
        });
        ArrayCore::new("/g/a", serde_json::from_value(metadata).unwrap()).unwrap()
    }

    #[test]
    fn tile_presence_location() {
        let storage: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let cache: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let path = NodePath::new("/g/a").unwrap();
        let location = PresenceLocation::new(&storage, None, &path, false);
        assert_eq!(location.path().as_str(), "/.cache/_g_a_tile_presence");
        assert!(!location.is_writable());
        let location = PresenceLocation::new(&storage, Some(&cache), &path, false);
        assert_eq!(location.path().as_str(), "/_g_a_tile_presence");
        assert!(location.is_writable());
    }

    #[test]
    fn tile_presence_build_load() -> Result<(), Box<dyn std::error::Error>> {
        let storage: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let path = NodePath::new("/g/a")?;
        let array = array_core();
        storage.set(&StoreKey::new("g/a/.zarray")?, b"{}")?;
        storage.set(&StoreKey::new("g/a/0.1")?, &[0; 32])?;
        storage.set(&StoreKey::new("g/a/2.2")?, &[0; 32])?;

        let location = PresenceLocation::new(&storage, None, &path, true);
        let mut presence = TilePresence::build(location.clone(), &storage, &path, &array)?;
        assert!(presence.is_present(&[0, 1]));
        assert!(presence.is_present(&[2, 2]));
        assert!(!presence.is_present(&[1, 1]));
        assert!(presence.is_present(&[5, 5]));
        assert!(storage.exists(&StoreKey::new(".cache/.zgroup")?)?);
        let attributes: Attributes = serde_json::from_slice(
            &storage
                .get(&StoreKey::new(".cache/_g_a_tile_presence/.zattrs")?)?
                .unwrap(),
        )?;
        assert_eq!(attributes[FILLING_STATUS_ATTRIBUTE], "some_tiles_missing");

        presence.set_present(&[1, 1], true)?;
        presence.set_present(&[0, 1], false)?;
        let loaded = TilePresence::load(location.clone(), &array)?.unwrap();
        assert!(loaded.is_present(&[1, 1]));
        assert!(!loaded.is_present(&[0, 1]));
        assert!(loaded.is_present(&[2, 2]));

        location.erase()?;
        assert!(TilePresence::load(location, &array)?.is_none());
        Ok(())
    }

    #[test]
    fn tile_presence_mismatch_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let storage: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let path = NodePath::new("/g/a")?;
        let location = PresenceLocation::new(&storage, None, &path, true);
        TilePresence::build(location.clone(), &storage, &path, &array_core())?;

        let metadata = json!({
            "zarr_format": 2, "shape": [30, 10], "chunks": [4, 4], "dtype": "<i2",
            "compressor": null, "fill_value": 0, "filters": null, "order": "C",
        });
        let resized = ArrayCore::new("/g/a", serde_json::from_value(metadata)?)?;
        assert!(TilePresence::load(location, &resized)?.is_none());
        Ok(())
    }

    #[test]
    fn tile_presence_read_only() {
        let storage: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let path = NodePath::new("/g/a").unwrap();
        let location = PresenceLocation::new(&storage, None, &path, false);
        assert!(TilePresence::build(location, &storage, &path, &array_core()).is_err());
    }
}
