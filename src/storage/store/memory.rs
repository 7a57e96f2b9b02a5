//! An in-memory store.

use parking_lot::RwLock;

use std::collections::{BTreeMap, BTreeSet};

use super::{
    ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
    StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};
use crate::storage::MaybeBytes;

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new, empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of values in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.read().len()
    }

    /// Returns true if the store holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.read().is_empty()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.read().get(key).cloned())
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.data_map.read().get(key).map(|value| value.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.data_map.write().insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.write().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.data_map.write().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }

    fn rename_prefix(&self, from: &StorePrefix, to: &StorePrefix) -> Result<(), StorageError> {
        let mut data_map = self.data_map.write();
        if data_map.keys().any(|key| key.has_prefix(to)) {
            return Err(StorageError::RenameTargetExists(to.clone()));
        }
        let keys: Vec<StoreKey> = data_map
            .keys()
            .filter(|key| key.has_prefix(from))
            .cloned()
            .collect();
        for key in keys {
            if let (Some(value), Some(new_key)) =
                (data_map.remove(&key), key.with_prefix_replaced(from, to))
            {
                data_map.insert(new_key, value);
            }
        }
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .read()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys: StoreKeys = vec![];
        let mut prefixes: BTreeSet<StorePrefix> = BTreeSet::default();
        let data_map = self.data_map.read();
        for key in data_map.keys() {
            let Some(relative) = key.strip_prefix(prefix) else {
                continue;
            };
            match relative.split_once('/') {
                Some((child, _)) => {
                    prefixes.insert(StorePrefix::new(
                        prefix.as_str().to_string() + child + "/",
                    )?);
                }
                None => keys.push(key.clone()),
            }
        }
        Ok(StoreKeysPrefixes::new(keys, prefixes.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_get_erase() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let key = StoreKey::new("a/b")?;
        store.set(&key, &[0, 1, 2])?;
        assert_eq!(store.get(&key)?.unwrap(), vec![0, 1, 2]);
        assert_eq!(store.size_key(&key)?, Some(3));
        store.erase(&key)?;
        assert!(store.get(&key)?.is_none());
        store.erase(&key)?;
        Ok(())
    }

    #[test]
    fn memory_list() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&"a/b".try_into()?, &[])?;
        store.set(&"a/c".try_into()?, &[])?;
        store.set(&"a/d/e".try_into()?, &[])?;
        store.set(&"a/f/g".try_into()?, &[])?;
        store.set(&"b/c/d".try_into()?, &[])?;

        assert_eq!(store.list()?.len(), 5);
        assert_eq!(store.list_prefix(&"a/".try_into()?)?.len(), 4);
        let list_dir = store.list_dir(&"a/".try_into()?)?;
        assert_eq!(
            list_dir.keys(),
            &vec![StoreKey::new("a/b")?, StoreKey::new("a/c")?]
        );
        assert_eq!(
            list_dir.prefixes(),
            &vec![StorePrefix::new("a/d/")?, StorePrefix::new("a/f/")?]
        );
        let root = store.list_dir(&StorePrefix::root())?;
        assert!(root.keys().is_empty());
        assert_eq!(root.prefixes().len(), 2);
        Ok(())
    }

    #[test]
    fn memory_rename_prefix() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&"a/x/.zarray".try_into()?, &[1])?;
        store.set(&"a/x/0.0".try_into()?, &[2])?;
        store.set(&"ab/y".try_into()?, &[3])?;
        store.rename_prefix(&"a/".try_into()?, &"z/".try_into()?)?;
        assert_eq!(store.get(&"z/x/0.0".try_into()?)?.unwrap(), vec![2]);
        assert!(store.get(&"a/x/0.0".try_into()?)?.is_none());
        assert!(store.get(&"ab/y".try_into()?)?.is_some());
        assert!(matches!(
            store.rename_prefix(&"z/".try_into()?, &"ab/".try_into()?),
            Err(StorageError::RenameTargetExists(_))
        ));
        store.erase_prefix(&"z/".try_into()?)?;
        assert_eq!(store.len(), 1);
        Ok(())
    }
}
