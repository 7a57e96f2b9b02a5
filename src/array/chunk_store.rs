//! Chunk storage: maps chunk grid indices to decoded chunks.

use crate::{
    config::Config,
    node::NodePath,
    storage::{
        data_key, ReadableStorageTraits, ReadableWritableListableStorageTraits, StoreKey,
        WritableStorageTraits,
    },
};

use super::{array_core::ArrayCore, tile_presence::PresenceState, ArrayError};

/// The chunks of an array in a store.
///
/// A chunk which is not stored reads as [`None`]: every element of it has the fill value.
/// Decoded chunks are in the in-memory representation of the data type of the array, in row-major order.
pub(crate) struct ChunkStore<'a> {
    storage: &'a dyn ReadableWritableListableStorageTraits,
    path: &'a NodePath,
    core: &'a ArrayCore,
    allow_partial_reads: bool,
    free_empty_chunks: bool,
}

impl<'a> ChunkStore<'a> {
    pub(crate) fn new(
        storage: &'a dyn ReadableWritableListableStorageTraits,
        path: &'a NodePath,
        core: &'a ArrayCore,
        config: &Config,
    ) -> Self {
        Self {
            storage,
            path,
            core,
            allow_partial_reads: config.allow_partial_reads(),
            free_empty_chunks: config.free_empty_chunks(),
        }
    }

    pub(crate) const fn core(&self) -> &ArrayCore {
        self.core
    }

    pub(crate) fn storage(&self) -> &'a dyn ReadableWritableListableStorageTraits {
        self.storage
    }

    pub(crate) fn key(&self, chunk_indices: &[u64]) -> StoreKey {
        data_key(self.path, chunk_indices, self.core.chunk_key_encoding())
    }

    /// Retrieve and decode the chunk at `chunk_indices`, [`None`] if it is not stored.
    ///
    /// A chunk known to be absent from the tile presence cache is not requested from the store.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the store fails, or if the chunk cannot be decoded and partial reads are not allowed.
    pub(crate) fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<Option<Vec<u8>>, ArrayError> {
        {
            let cache = self.core.cache();
            if let Some(chunk) = cache.advised.as_ref().and_then(|advised| advised.get(chunk_indices)) {
                return Ok(chunk.clone());
            }
            if let PresenceState::Loaded(presence) = &cache.presence {
                if !presence.is_present(chunk_indices) {
                    return Ok(None);
                }
            }
        }
        self.retrieve_chunk_uncached(chunk_indices)
    }

    /// Retrieve and decode the chunk at `chunk_indices` from the store.
    pub(crate) fn retrieve_chunk_uncached(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<Vec<u8>>, ArrayError> {
        let Some(encoded) = self.storage.get(&self.key(chunk_indices))? else {
            return Ok(None);
        };
        match self
            .core
            .codec_chain()
            .decode(encoded, self.core.chunk_shape())
        {
            Ok(decoded) => Ok(Some(decoded)),
            Err(err) if self.allow_partial_reads => {
                log::warn!(
                    "chunk {chunk_indices:?} of {} cannot be decoded and is read as fill value: {err}",
                    self.path
                );
                Ok(None)
            }
            Err(source) => Err(ArrayError::ChunkError {
                chunk: chunk_indices.to_vec(),
                source,
            }),
        }
    }

    /// Encode and store the chunk at `chunk_indices`.
    ///
    /// If empty chunks are freed, a chunk holding only the fill value (zero if the array has none) is erased instead.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the chunk cannot be encoded or the store fails.
    pub(crate) fn store_chunk(&self, chunk_indices: &[u64], decoded: Vec<u8>) -> Result<(), ArrayError> {
        if self.free_empty_chunks && self.is_empty(&decoded) {
            return self.erase_chunk(chunk_indices);
        }
        let encoded = self
            .core
            .codec_chain()
            .encode(decoded, self.core.chunk_shape())
            .map_err(|source| ArrayError::ChunkError {
                chunk: chunk_indices.to_vec(),
                source,
            })?;
        self.storage.set(&self.key(chunk_indices), &encoded)?;
        self.update_presence(chunk_indices, true)
    }

    /// Erase the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the store fails.
    pub(crate) fn erase_chunk(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        self.storage.erase(&self.key(chunk_indices))?;
        self.update_presence(chunk_indices, false)
    }

    fn is_empty(&self, decoded: &[u8]) -> bool {
        match self.core.fill_value() {
            Some(fill_value) => fill_value.equals_all(decoded),
            None => decoded.iter().all(|byte| *byte == 0),
        }
    }

    fn update_presence(&self, chunk_indices: &[u64], present: bool) -> Result<(), ArrayError> {
        let mut cache = self.core.cache();
        if let PresenceState::Loaded(presence) = &mut cache.presence {
            presence.set_present(chunk_indices, present)?;
        }
        Ok(())
    }
}
