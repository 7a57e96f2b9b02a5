//! Chunk and metadata storage ([stores](store) and [storage adapters](storage_adapter)).
//!
//! A [store] is a key/value system holding the metadata documents and chunk blobs of a hierarchy.
//! Keys are `/` separated paths relative to the store root, e.g. `group/array/.zarray` or `group/array/0.1`.
//!
//! This module defines the abstract store interfaces, the in-memory and filesystem stores,
//! and the helpers mapping node paths and chunk indices to [`StoreKey`]s.

mod metadata_transaction;
pub mod storage_adapter;
mod storage_sync;
pub mod store;
mod store_key;
mod store_prefix;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    array::ChunkKeyEncoding,
    node::{NodeNameError, NodePath},
};

pub use metadata_transaction::{apply_metadata_writes, MetadataWrite};
pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError, StorePrefixes};

pub use self::storage_sync::{
    ListableStorageTraits, ReadableStorageTraits, ReadableWritableListableStorageTraits,
    WritableStorageTraits,
};

/// The value of a store key.
pub type Bytes = Vec<u8>;

/// An optional value of a store key. [`None`] if the key does not exist.
pub type MaybeBytes = Option<Bytes>;

/// [`Arc`] wrapped readable, writable, and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// [`StoreKeys`] and [`StorePrefixes`].
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct StoreKeysPrefixes {
    keys: StoreKeys,
    prefixes: StorePrefixes,
}

impl StoreKeysPrefixes {
    /// Create a new [`StoreKeysPrefixes`].
    #[must_use]
    pub fn new(keys: StoreKeys, prefixes: StorePrefixes) -> Self {
        Self { keys, prefixes }
    }

    /// Returns the keys.
    #[must_use]
    pub const fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// Returns the prefixes.
    #[must_use]
    pub const fn prefixes(&self) -> &StorePrefixes {
        &self.prefixes
    }
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An error parsing the metadata for a key.
    #[error("error parsing metadata for {0}: {1}")]
    InvalidMetadata(StoreKey, String),
    /// An invalid store prefix.
    #[error("invalid store prefix {0}")]
    StorePrefixError(#[from] StorePrefixError),
    /// An invalid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// An invalid node name.
    #[error("invalid node name {0}")]
    NodeNameError(#[from] NodeNameError),
    /// The destination of a rename already exists.
    #[error("cannot rename to {0}: it already exists")]
    RenameTargetExists(StorePrefix),
    /// The requested method is not supported.
    #[error("{0}")]
    Unsupported(String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// The array metadata document name.
pub const ARRAY_METADATA_KEY: &str = ".zarray";

/// The group metadata document name.
pub const GROUP_METADATA_KEY: &str = ".zgroup";

/// The attributes document name.
pub const ATTRIBUTES_KEY: &str = ".zattrs";

/// Return the key of the metadata document `metadata_file_name` of the node at `path`.
#[must_use]
fn meta_key_any(path: &NodePath, metadata_file_name: &str) -> StoreKey {
    let path = path.as_str();
    if path.eq("/") {
        unsafe { StoreKey::new_unchecked(metadata_file_name.to_string()) }
    } else {
        let path = path.strip_prefix('/').unwrap_or(path);
        unsafe { StoreKey::new_unchecked(format!("{path}/{metadata_file_name}")) }
    }
}

/// Return the array metadata key (`.zarray`) given a node path.
#[must_use]
pub fn meta_key_array(path: &NodePath) -> StoreKey {
    meta_key_any(path, ARRAY_METADATA_KEY)
}

/// Return the group metadata key (`.zgroup`) given a node path.
#[must_use]
pub fn meta_key_group(path: &NodePath) -> StoreKey {
    meta_key_any(path, GROUP_METADATA_KEY)
}

/// Return the attributes key (`.zattrs`) given a node path.
#[must_use]
pub fn meta_key_attributes(path: &NodePath) -> StoreKey {
    meta_key_any(path, ATTRIBUTES_KEY)
}

/// Return the store prefix of the node at `path`.
#[must_use]
pub fn node_prefix(path: &NodePath) -> StorePrefix {
    let path = path.as_str();
    if path.eq("/") {
        StorePrefix::root()
    } else {
        let path = path.strip_prefix('/').unwrap_or(path);
        unsafe { StorePrefix::new_unchecked(format!("{path}/")) }
    }
}

/// Return the data key given a node path, chunk grid indices, and a chunk key encoding.
#[must_use]
pub fn data_key(
    path: &NodePath,
    chunk_grid_indices: &[u64],
    chunk_key_encoding: &ChunkKeyEncoding,
) -> StoreKey {
    let prefix = node_prefix(path);
    unsafe {
        StoreKey::new_unchecked(
            prefix.as_str().to_string() + chunk_key_encoding.encode(chunk_grid_indices).as_str(),
        )
    }
}
