//! Multi-document metadata updates.

use super::{
    ReadableStorageTraits, ReadableWritableListableStorageTraits, StorageError, StoreKey,
    WritableStorageTraits,
};

/// A write of one metadata document: a new value, or [`None`] to erase it.
pub type MetadataWrite = (StoreKey, Option<Vec<u8>>);

/// Apply `writes` to `storage` as a unit.
///
/// Each document is written atomically by the store. The previous values are read first, and if a write fails, the
/// documents already written are restored in reverse order so that the store holds either every new document or
/// none of them.
///
/// # Errors
/// Returns the [`StorageError`] of the failed read or write.
pub fn apply_metadata_writes(
    storage: &dyn ReadableWritableListableStorageTraits,
    writes: &[MetadataWrite],
) -> Result<(), StorageError> {
    let previous = writes
        .iter()
        .map(|(key, _)| storage.get(key))
        .collect::<Result<Vec<_>, _>>()?;

    for (applied, (key, value)) in writes.iter().enumerate() {
        let result = match value {
            Some(value) => storage.set(key, value),
            None => storage.erase(key),
        };
        if let Err(err) = result {
            for ((key, _), previous) in writes[..applied].iter().zip(&previous).rev() {
                let restored = match previous {
                    Some(previous) => storage.set(key, previous),
                    None => storage.erase(key),
                };
                if let Err(restore_err) = restored {
                    log::warn!("failed to restore {key} after a failed metadata update: {restore_err}");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}
