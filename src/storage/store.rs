//! Stores.
//!
//! A store holds the metadata documents and chunks of a hierarchy:
//! - [`MemoryStore`]: an in-memory store, and
//! - [`FilesystemStore`]: a directory on a local filesystem.

mod filesystem;
mod memory;

pub use filesystem::{FilesystemStore, FilesystemStoreCreateError};
pub use memory::MemoryStore;

pub use super::{
    ListableStorageTraits, ReadableStorageTraits, ReadableWritableListableStorageTraits,
    StorageError, StoreKey, StoreKeyError, StoreKeys, StoreKeysPrefixes, StorePrefix,
    StorePrefixes, WritableStorageTraits,
};
