//! A storage adapter which counts accesses and fails writes on demand.

use std::sync::{
    atomic::{AtomicI64, AtomicUsize, Ordering},
    Arc,
};

use crate::storage::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, ReadableWritableListableStorageTraits,
    StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};

/// A storage adapter that records the number of reads and writes and can inject a write failure.
///
/// After [`fail_after`](FailingStorageAdapter::fail_after)`(n)`, the next `n` write operations succeed and the following one fails with an IO error,
/// without reaching the underlying store. Later writes succeed again.
/// Write operations are [`set`](WritableStorageTraits::set), [`erase`](WritableStorageTraits::erase),
/// [`erase_prefix`](WritableStorageTraits::erase_prefix) and [`rename_prefix`](WritableStorageTraits::rename_prefix).
#[derive(Debug)]
pub struct FailingStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    countdown: AtomicI64,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failures: AtomicUsize,
}

impl<TStorage: ?Sized> FailingStorageAdapter<TStorage> {
    /// Create a new adapter over `storage`. No failure is armed.
    #[must_use]
    pub fn new(storage: Arc<TStorage>) -> Self {
        Self {
            storage,
            countdown: AtomicI64::new(-1),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Let `successful_writes` writes through, then fail the next one.
    pub fn fail_after(&self, successful_writes: usize) {
        let countdown = i64::try_from(successful_writes).unwrap_or(i64::MAX);
        self.countdown.store(countdown, Ordering::SeqCst);
    }

    /// Disarm a pending failure.
    pub fn disarm(&self) {
        self.countdown.store(-1, Ordering::SeqCst);
    }

    /// Returns the number of read requests (`get`, `size_key`).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of write requests that reached the underlying store.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of injected failures.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn inner(&self) -> &Arc<TStorage> {
        &self.storage
    }

    fn before_write(&self, operation: &str) -> Result<(), StorageError> {
        let previous = self
            .countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |countdown| {
                (countdown >= 0).then(|| countdown - 1)
            });
        if previous == Ok(0) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            Err(StorageError::IOError(std::io::Error::other(format!(
                "injected failure of {operation}"
            ))))
        } else {
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> ReadableStorageTraits
    for FailingStorageAdapter<TStorage>
{
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.storage.get(key)
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.storage.size_key(key)
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> WritableStorageTraits
    for FailingStorageAdapter<TStorage>
{
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.before_write("set")?;
        self.storage.set(key, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.before_write("erase")?;
        self.storage.erase(key)
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.before_write("erase_prefix")?;
        self.storage.erase_prefix(prefix)
    }

    fn rename_prefix(&self, from: &StorePrefix, to: &StorePrefix) -> Result<(), StorageError> {
        self.before_write("rename_prefix")?;
        self.storage.rename_prefix(from, to)
    }

    fn is_read_only(&self) -> bool {
        self.storage.is_read_only()
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> ListableStorageTraits
    for FailingStorageAdapter<TStorage>
{
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.storage.list_prefix(prefix)
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.storage.list_dir(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;

    #[test]
    fn failing_adapter_fails_once() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let adapter = FailingStorageAdapter::new(store.clone());
        adapter.fail_after(1);
        adapter.set(&"a".try_into()?, &[1])?;
        assert!(adapter.set(&"b".try_into()?, &[2]).is_err());
        adapter.set(&"c".try_into()?, &[3])?;
        assert!(store.get(&"b".try_into()?)?.is_none());
        assert_eq!(adapter.writes(), 2);
        assert_eq!(adapter.failures(), 1);

        adapter.fail_after(0);
        adapter.disarm();
        adapter.erase(&"a".try_into()?)?;
        assert_eq!(adapter.failures(), 1);
        assert!(adapter.get(&"a".try_into()?)?.is_none());
        assert_eq!(adapter.reads(), 1);
        Ok(())
    }
}
