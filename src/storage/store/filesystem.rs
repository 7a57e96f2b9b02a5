//! A filesystem store.
//!
//! Keys map to files below a base directory, with `/` in a key mapping to a directory separator.
//! Values are written to a hidden sibling file which is then renamed over the destination,
//! so a value is always either its previous or its new content, even if a write is interrupted.

use super::{
    ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
    StoreKeysPrefixes, StorePrefix, StorePrefixes, WritableStorageTraits,
};
use crate::storage::MaybeBytes;

use parking_lot::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

const PARTIAL_SUFFIX: &str = ".partial";

/// A file system store.
#[derive(Debug)]
pub struct FilesystemStore {
    base_directory: PathBuf,
    readonly: bool,
    temporary_counter: AtomicU64,
    structure_lock: Mutex<()>,
}

impl FilesystemStore {
    /// Create a new file system store at a given `base_directory`.
    /// The base directory will be created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`FilesystemStoreCreateError`] if `base_directory`:
    ///   - is not valid, or
    ///   - it points to an existing file rather than a directory.
    pub fn new<P: AsRef<Path>>(
        base_directory: P,
    ) -> Result<FilesystemStore, FilesystemStoreCreateError> {
        let base_directory = base_directory.as_ref().to_path_buf();
        if base_directory.to_str().is_none() {
            return Err(FilesystemStoreCreateError::InvalidBaseDirectory(
                base_directory,
            ));
        }
        if base_directory.is_file() {
            return Err(FilesystemStoreCreateError::ExistingFile(base_directory));
        }
        let readonly = if base_directory.is_dir() {
            // the directory already exists, check if it is read only
            let md =
                std::fs::metadata(&base_directory).map_err(FilesystemStoreCreateError::IOError)?;
            md.permissions().readonly()
        } else {
            std::fs::create_dir_all(&base_directory)
                .map_err(FilesystemStoreCreateError::IOError)?;
            false
        };
        Ok(FilesystemStore {
            base_directory,
            readonly,
            temporary_counter: AtomicU64::new(0),
            structure_lock: Mutex::new(()),
        })
    }

    /// Returns the base directory of the store.
    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Maps a [`StoreKey`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        let mut path = self.base_directory.clone();
        path.extend(key.as_str().split('/'));
        path
    }

    /// Maps a [`StorePrefix`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn prefix_to_fspath(&self, prefix: &StorePrefix) -> PathBuf {
        let mut path = self.base_directory.clone();
        path.extend(prefix.as_str().split('/').filter(|c| !c.is_empty()));
        path
    }

    fn fspath_to_key(&self, path: &Path) -> Option<StoreKey> {
        let relative = pathdiff::diff_paths(path, &self.base_directory)?;
        let components: Vec<&str> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<_>>()?;
        StoreKey::new(components.join("/")).ok()
    }

    fn is_partial_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX))
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.readonly {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl ReadableStorageTraits for FilesystemStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        match std::fs::read(self.key_to_fspath(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        match std::fs::metadata(self.key_to_fspath(key)) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl WritableStorageTraits for FilesystemStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        let key_path = self.key_to_fspath(key);
        let parent = key_path
            .parent()
            .ok_or_else(|| StorageError::Other(format!("{key} has no parent directory")))?;
        std::fs::create_dir_all(parent)?;

        let temporary_path = parent.join(format!(
            ".{}.{}.{}{PARTIAL_SUFFIX}",
            key.file_name(),
            std::process::id(),
            self.temporary_counter.fetch_add(1, Ordering::Relaxed)
        ));
        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temporary_path)?;
            file.write_all(value)?;
            file.sync_data()?;
            std::fs::rename(&temporary_path, &key_path)
        };
        write().map_err(|err| {
            let _ = std::fs::remove_file(&temporary_path);
            StorageError::IOError(err)
        })
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.check_writable()?;
        match std::fs::remove_file(self.key_to_fspath(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.check_writable()?;
        let _lock = self.structure_lock.lock();
        let prefix_path = self.prefix_to_fspath(prefix);
        if prefix.is_root() {
            for entry in std::fs::read_dir(&prefix_path)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                } else {
                    std::fs::remove_file(path)?;
                }
            }
            Ok(())
        } else {
            match std::fs::remove_dir_all(prefix_path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        }
    }

    fn rename_prefix(&self, from: &StorePrefix, to: &StorePrefix) -> Result<(), StorageError> {
        self.check_writable()?;
        if from.is_root() || to.is_root() {
            return Err(StorageError::Unsupported(
                "the root prefix cannot be renamed".to_string(),
            ));
        }
        let _lock = self.structure_lock.lock();
        let from_path = self.prefix_to_fspath(from);
        let to_path = self.prefix_to_fspath(to);
        if to_path.exists() {
            return Err(StorageError::RenameTargetExists(to.clone()));
        }
        if !from_path.exists() {
            return Ok(());
        }
        if let Some(parent) = to_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(from_path, to_path)?;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.readonly
    }
}

impl ListableStorageTraits for FilesystemStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let prefix_path = self.prefix_to_fspath(prefix);
        if !prefix_path.is_dir() {
            return Ok(vec![]);
        }
        let mut keys: StoreKeys = WalkDir::new(prefix_path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file() && !Self::is_partial_file(entry.path()))
            .filter_map(|entry| self.fspath_to_key(entry.path()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let prefix_path = self.prefix_to_fspath(prefix);
        let mut keys: StoreKeys = vec![];
        let mut prefixes: StorePrefixes = vec![];
        let entries = match std::fs::read_dir(prefix_path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(StoreKeysPrefixes::default());
            }
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if Self::is_partial_file(&path) {
                continue;
            }
            let Some(key) = self.fspath_to_key(&path) else {
                continue;
            };
            if entry.file_type()?.is_dir() {
                prefixes.push(key.to_prefix());
            } else {
                keys.push(key);
            }
        }
        keys.sort();
        prefixes.sort();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The path is not valid on this system.
    #[error("base directory {} is not valid", _0.to_str().unwrap_or_default())]
    InvalidBaseDirectory(PathBuf),
    /// The path points to an existing file.
    #[error("base directory {} is an existing file", _0.to_str().unwrap_or_default())]
    ExistingFile(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_set_get_list() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        store.set(&"a/b".try_into()?, &[0, 1, 2])?;
        store.set(&"a/c".try_into()?, &[3])?;
        store.set(&"a/d/e".try_into()?, &[])?;
        store.set(&"b/.zgroup".try_into()?, &[])?;

        assert_eq!(store.get(&"a/b".try_into()?)?.unwrap(), vec![0, 1, 2]);
        assert_eq!(store.size_key(&"a/c".try_into()?)?, Some(1));
        assert!(store.get(&"a/x".try_into()?)?.is_none());
        assert_eq!(store.list()?.len(), 4);
        assert_eq!(store.list_prefix(&"a/".try_into()?)?.len(), 3);

        let list_dir = store.list_dir(&"a/".try_into()?)?;
        assert_eq!(
            list_dir.keys(),
            &vec![StoreKey::new("a/b")?, StoreKey::new("a/c")?]
        );
        assert_eq!(list_dir.prefixes(), &vec![StorePrefix::new("a/d/")?]);
        Ok(())
    }

    #[test]
    fn filesystem_overwrite_leaves_no_partial_files() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        let key = StoreKey::new("x/.zarray")?;
        store.set(&key, b"old")?;
        store.set(&key, b"new")?;
        assert_eq!(store.get(&key)?.unwrap(), b"new");
        let names: Vec<_> = std::fs::read_dir(path.path().join("x"))?
            .map(|entry| entry.map(|entry| entry.file_name()))
            .collect::<Result<_, _>>()?;
        assert_eq!(names.len(), 1);
        Ok(())
    }

    #[test]
    fn filesystem_rename_erase_prefix() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        store.set(&"g/a/.zarray".try_into()?, b"{}")?;
        store.set(&"g/a/0".try_into()?, &[1])?;
        store.set(&"h/.zgroup".try_into()?, b"{}")?;
        store.rename_prefix(&"g/a/".try_into()?, &"g/b/".try_into()?)?;
        assert!(store.get(&"g/a/0".try_into()?)?.is_none());
        assert_eq!(store.get(&"g/b/0".try_into()?)?.unwrap(), vec![1]);
        assert!(matches!(
            store.rename_prefix(&"g/b/".try_into()?, &"h/".try_into()?),
            Err(StorageError::RenameTargetExists(_))
        ));
        store.erase_prefix(&"g/".try_into()?)?;
        assert_eq!(store.list()?, vec![StoreKey::new("h/.zgroup")?]);
        store.erase(&"h/missing".try_into()?)?;
        Ok(())
    }
}
