//! The complete chain of stages of an array.

use std::sync::Arc;

use crate::{
    array::codec::{
        array_to_array::transpose, create_bytes_to_bytes_codec, BytesToBytesCodecTraits,
        CodecError,
    },
    metadata::{ArrayMetadataOrder, CodecMetadata},
    plugin::PluginCreateError,
};

use super::bytes::StorageLayout;

/// A codec chain: the memory layout stage, the bytes stage, filters, and a compressor.
///
/// Encoding applies, in order:
///  1. the memory layout ([`ArrayMetadataOrder::F`] reverses the axes of a chunk),
///  2. the [`StorageLayout`] packing elements and setting their byte order,
///  3. each filter, then
///  4. the compressor.
///
/// Decoding applies the inverse of each stage in the opposite order.
#[derive(Debug, Clone)]
pub struct CodecChain {
    order: ArrayMetadataOrder,
    layout: StorageLayout,
    filters: Vec<Arc<dyn BytesToBytesCodecTraits>>,
    compressor: Option<Arc<dyn BytesToBytesCodecTraits>>,
}

impl CodecChain {
    /// Create a new codec chain.
    #[must_use]
    pub fn new(
        order: ArrayMetadataOrder,
        layout: StorageLayout,
        filters: Vec<Arc<dyn BytesToBytesCodecTraits>>,
        compressor: Option<Arc<dyn BytesToBytesCodecTraits>>,
    ) -> Self {
        Self {
            order,
            layout,
            filters,
            compressor,
        }
    }

    /// Create a codec chain from the `order`, `filters` and `compressor` of array metadata.
    ///
    /// Codecs with no registered implementation are kept as [`UnsupportedCodec`](super::super::UnsupportedCodec)s.
    ///
    /// # Errors
    /// Returns a [`PluginCreateError`] if the configuration of a codec is invalid.
    pub fn from_metadata(
        order: ArrayMetadataOrder,
        layout: StorageLayout,
        filters: Option<&[CodecMetadata]>,
        compressor: Option<&CodecMetadata>,
    ) -> Result<Self, PluginCreateError> {
        let element_size = layout.storage_size();
        let filters = filters
            .unwrap_or_default()
            .iter()
            .map(|metadata| create_bytes_to_bytes_codec(metadata, element_size))
            .collect::<Result<Vec<_>, _>>()?;
        let compressor = compressor
            .map(|metadata| create_bytes_to_bytes_codec(metadata, element_size))
            .transpose()?;
        Ok(Self::new(order, layout, filters, compressor))
    }

    /// The memory layout order.
    #[must_use]
    pub const fn order(&self) -> ArrayMetadataOrder {
        self.order
    }

    /// The storage layout of elements.
    #[must_use]
    pub const fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// The metadata of the filters, [`None`] if there are no filters.
    #[must_use]
    pub fn filters_metadata(&self) -> Option<Vec<CodecMetadata>> {
        (!self.filters.is_empty()).then(|| {
            self.filters
                .iter()
                .map(|filter| filter.create_metadata())
                .collect()
        })
    }

    /// The metadata of the compressor.
    #[must_use]
    pub fn compressor_metadata(&self) -> Option<CodecMetadata> {
        self.compressor
            .as_ref()
            .map(|compressor| compressor.create_metadata())
    }

    /// Encode a chunk of `chunk_shape` from its in-memory representation.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if a stage fails or the size of `decoded_value` does not match `chunk_shape`.
    pub fn encode(&self, decoded_value: Vec<u8>, chunk_shape: &[u64]) -> Result<Vec<u8>, CodecError> {
        let expected = self.expected_size(chunk_shape, self.layout.memory_size())?;
        if decoded_value.len() != expected {
            return Err(CodecError::UnexpectedChunkDecodedSize(
                decoded_value.len(),
                expected,
            ));
        }
        let value = match self.order {
            ArrayMetadataOrder::C => decoded_value,
            ArrayMetadataOrder::F => transpose::encode_column_major(
                &decoded_value,
                chunk_shape,
                self.layout.memory_size(),
            )?,
        };
        let mut value = self.layout.encode(value);
        for filter in &self.filters {
            value = filter.encode(value)?;
        }
        if let Some(compressor) = &self.compressor {
            value = compressor.encode(value)?;
        }
        Ok(value)
    }

    /// Decode an encoded chunk of `chunk_shape` to its in-memory representation.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if a stage fails or the decoded chunk is not the size of a chunk of `chunk_shape`.
    pub fn decode(&self, encoded_value: Vec<u8>, chunk_shape: &[u64]) -> Result<Vec<u8>, CodecError> {
        let expected = self.expected_size(chunk_shape, self.layout.storage_size())?;
        let mut value = encoded_value;
        if let Some(compressor) = &self.compressor {
            let decoded_size = self.filters.is_empty().then_some(expected);
            value = compressor.decode(value, decoded_size)?;
        }
        for (index, filter) in self.filters.iter().enumerate().rev() {
            let decoded_size = (index == 0).then_some(expected);
            value = filter.decode(value, decoded_size)?;
        }
        if value.len() != expected {
            return Err(CodecError::UnexpectedChunkDecodedSize(value.len(), expected));
        }
        let value = self.layout.decode(value);
        match self.order {
            ArrayMetadataOrder::C => Ok(value),
            ArrayMetadataOrder::F => {
                transpose::decode_column_major(&value, chunk_shape, self.layout.memory_size())
            }
        }
    }

    fn expected_size(&self, chunk_shape: &[u64], element_size: usize) -> Result<usize, CodecError> {
        chunk_shape
            .iter()
            .try_fold(element_size, |size, extent| {
                usize::try_from(*extent)
                    .ok()
                    .and_then(|extent| size.checked_mul(extent))
            })
            .ok_or_else(|| CodecError::Other("chunk too large".to_string()))
    }
}
