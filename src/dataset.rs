//! Datasets.
//!
//! A [`Dataset`] is a handle to a hierarchy in a store. Opening a dataset discovers every group, array and dimension
//! of the store into an in-process node graph, which is shared by every [`Group`], [`MDArray`](crate::array::MDArray),
//! [`Dimension`](crate::dimension::Dimension) and [`Attribute`](crate::attribute::Attribute) handle obtained from it.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use mdstore::dataset::{Dataset, OpenOptions};
//! # use mdstore::storage::store::MemoryStore;
//! let store = Arc::new(MemoryStore::new());
//! let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
//! dataset.root_group().create_group("g")?;
//!
//! let dataset = Dataset::open(store, &OpenOptions::default())?;
//! assert_eq!(dataset.root_group().group_names()?, vec!["g".to_string()]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    array::{
        tile_presence::{ensure_presence, PresenceLocation},
        ArrayCore, ArrayError, ChunkStore,
    },
    config::{global_config, Config},
    error::MdError,
    group::Group,
    metadata::{Attributes, GroupMetadata},
    node::{discover, NodeGraph, NodeKind, NodePath, ROOT},
    storage::{
        meta_key_attributes, meta_key_group, MetadataWrite, ReadableStorageTraits,
        ReadableWritableListableStorage, StorageError, WritableStorageTraits,
    },
};

/// Options for opening a [`Dataset`].
#[derive(Clone)]
pub struct OpenOptions {
    update: bool,
    multidim: bool,
    cache_storage: Option<ReadableWritableListableStorage>,
    config: Config,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            update: false,
            multidim: true,
            cache_storage: None,
            config: global_config().clone(),
        }
    }
}

impl std::fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("update", &self.update)
            .field("multidim", &self.multidim)
            .field("cache_storage", &self.cache_storage.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl OpenOptions {
    /// Open the dataset in update mode, allowing mutations. Defaults to `false`.
    pub fn update(&mut self, update: bool) -> &mut Self {
        self.update = update;
        self
    }

    /// Open the dataset in multidimensional mode, allowing schema mutations. Defaults to `true`.
    ///
    /// Outside of multidimensional mode, groups, arrays and dimensions can be read and array data can be written in
    /// update mode, but they cannot be created, renamed, resized or deleted.
    pub fn multidim(&mut self, multidim: bool) -> &mut Self {
        self.multidim = multidim;
        self
    }

    /// Keep tile presence caches in `cache_storage` instead of the `.cache` group of the dataset.
    pub fn cache_storage(&mut self, cache_storage: Option<ReadableWritableListableStorage>) -> &mut Self {
        self.cache_storage = cache_storage;
        self
    }

    /// Use `config` instead of a snapshot of the [global configuration](global_config).
    pub fn config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }
}

/// The state shared by every handle of a dataset.
pub(crate) struct SharedResource {
    pub(crate) storage: ReadableWritableListableStorage,
    pub(crate) cache_storage: Option<ReadableWritableListableStorage>,
    pub(crate) update: bool,
    pub(crate) multidim: bool,
    pub(crate) config: Config,
    pub(crate) graph: RwLock<NodeGraph>,
}

impl SharedResource {
    pub(crate) fn check_update(&self) -> Result<(), MdError> {
        if self.update {
            Ok(())
        } else {
            Err(MdError::ReadOnly)
        }
    }

    /// Check that the schema of the dataset can be changed.
    pub(crate) fn check_schema_mutation(&self) -> Result<(), MdError> {
        self.check_update()?;
        if self.multidim {
            Ok(())
        } else {
            Err(MdError::InvalidArgument(
                "Dataset not open in multidimensional mode".to_string(),
            ))
        }
    }

    pub(crate) fn chunk_store<'a>(
        &'a self,
        path: &'a NodePath,
        core: &'a ArrayCore,
    ) -> ChunkStore<'a> {
        ChunkStore::new(self.storage.as_ref(), path, core, &self.config)
    }

    pub(crate) fn presence_location(&self, path: &NodePath) -> PresenceLocation {
        PresenceLocation::new(&self.storage, self.cache_storage.as_ref(), path, self.update)
    }

    /// Look up the tile presence cache of the array at `path` if it has not been looked up yet.
    pub(crate) fn ensure_presence(
        &self,
        path: &NodePath,
        core: &Arc<ArrayCore>,
    ) -> Result<(), ArrayError> {
        ensure_presence(core, || self.presence_location(path))
    }

    /// Erase the tile presence caches of the arrays at `paths`.
    ///
    /// A cache which cannot be erased is logged, since the arrays are then ignored by it on the next open.
    pub(crate) fn erase_tile_presence(&self, paths: &[NodePath]) {
        for path in paths {
            if let Err(err) = self.presence_location(path).erase() {
                log::warn!("failed to erase the tile presence cache of {path}: {err}");
            }
        }
    }

    /// The write of the `.zattrs` of the node at `path`: erased if `attributes` is empty.
    pub(crate) fn attributes_write(
        path: &NodePath,
        attributes: &Attributes,
    ) -> Result<MetadataWrite, MdError> {
        let key = meta_key_attributes(path);
        if attributes.is_empty() {
            Ok((key, None))
        } else {
            Ok((key, Some(serde_json::to_vec_pretty(attributes)?)))
        }
    }

    /// Write the `.zattrs` of the node at `path`.
    pub(crate) fn write_attributes(
        &self,
        path: &NodePath,
        attributes: &Attributes,
    ) -> Result<(), MdError> {
        match Self::attributes_write(path, attributes)? {
            (key, Some(value)) => self.storage.set(&key, &value)?,
            (key, None) => self.storage.erase(&key)?,
        }
        Ok(())
    }
}

/// A multidimensional dataset.
#[derive(Clone)]
pub struct Dataset {
    shared: Arc<SharedResource>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("update", &self.shared.update)
            .field("multidim", &self.shared.multidim)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Create a dataset in `storage`, writing its root group.
    ///
    /// The dataset is open in update mode, whatever `options` says.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the store fails.
    pub fn create(
        storage: ReadableWritableListableStorage,
        options: &OpenOptions,
    ) -> Result<Self, MdError> {
        let key = meta_key_group(&NodePath::root());
        if !storage.exists(&key)? {
            storage.set(&key, &serde_json::to_vec_pretty(&GroupMetadata::default())?)?;
        }
        let mut options = options.clone();
        options.update(true);
        Self::open(storage, &options)
    }

    /// Open the dataset in `storage`.
    ///
    /// # Errors
    /// Returns [`MdError::NotFound`] if the store holds neither a root group nor any node,
    /// or another [`MdError`] if the store fails.
    pub fn open(
        storage: ReadableWritableListableStorage,
        options: &OpenOptions,
    ) -> Result<Self, MdError> {
        let graph = discover(storage.as_ref())?;
        let root_group = storage.exists(&meta_key_group(&NodePath::root()))?;
        if !root_group && graph.get(ROOT).children.is_empty() {
            return Err(MdError::NotFound {
                kind: NodeKind::Group,
                name: "/".to_string(),
            });
        }
        if options.update && storage.is_read_only() {
            return Err(StorageError::ReadOnly.into());
        }
        Ok(Self {
            shared: Arc::new(SharedResource {
                storage,
                cache_storage: options.cache_storage.clone(),
                update: options.update,
                multidim: options.multidim,
                config: options.config.clone(),
                graph: RwLock::new(graph),
            }),
        })
    }

    /// The root group of the dataset.
    #[must_use]
    pub fn root_group(&self) -> Group {
        Group::new(self.shared.clone(), ROOT)
    }

    /// Returns true if the dataset is open in update mode.
    #[must_use]
    pub fn is_update(&self) -> bool {
        self.shared.update
    }

    /// The store of the dataset.
    #[must_use]
    pub fn storage(&self) -> &ReadableWritableListableStorage {
        &self.shared.storage
    }

    /// Return a tree representation of the hierarchy of the dataset.
    #[must_use]
    pub fn hierarchy_tree(&self) -> String {
        self.shared.graph.read().hierarchy_tree(ROOT)
    }
}
