use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::metadata::{
    data_type_from_metadata, fill_value_from_metadata, fill_value_to_metadata, ArrayMetadata,
    ENUMS_FIELD,
};

use super::{
    chunk_cache::ChunkCache, chunk_grid::RegularChunkGrid, codec::StorageLayout,
    tile_presence::PresenceState, ArrayCreateError, ArrayShape, ChunkKeyEncoding, CodecChain,
    ExtendedDataType, FillValue,
};

/// The interpreted metadata of an array and its caches.
///
/// The data type, codecs, chunk grid and chunk key encoding of an array are immutable.
/// The shape and the fill value change with resize and `set_no_data`.
#[derive(Debug)]
pub(crate) struct ArrayCore {
    data_type: ExtendedDataType,
    codec_chain: CodecChain,
    chunk_key_encoding: ChunkKeyEncoding,
    chunk_grid: RegularChunkGrid,
    state: RwLock<ArrayState>,
    cache: Mutex<ArrayCache>,
}

#[derive(Debug)]
struct ArrayState {
    /// The metadata document, rewritten with unknown fields preserved.
    metadata: ArrayMetadata,
    fill_value: Option<FillValue>,
}

/// The caches of an array. Invalidated by writes, resize, rename and delete.
#[derive(Debug, Default)]
pub(crate) struct ArrayCache {
    pub(crate) advised: Option<ChunkCache>,
    pub(crate) presence: PresenceState,
}

impl ArrayCore {
    /// Interpret the metadata of the array `name`.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if the metadata is invalid or unsupported.
    pub(crate) fn new(name: &str, metadata: ArrayMetadata) -> Result<Self, ArrayCreateError> {
        let parsed = data_type_from_metadata(
            &metadata.dtype,
            metadata.additional_fields.get(ENUMS_FIELD),
        )?;
        let data_type = parsed.data_type;
        if data_type.size().is_none() {
            return Err(ArrayCreateError::VariableLengthString);
        }
        let layout = StorageLayout::new(&data_type, &parsed.leaf_endianness)?;
        let fill_value = fill_value_from_metadata(&metadata.fill_value, &data_type, &layout)?;
        let chunk_grid = RegularChunkGrid::new(
            name,
            metadata.chunks.clone(),
            &metadata.shape,
            layout.memory_size(),
        )?;
        let codec_chain = CodecChain::from_metadata(
            metadata.order,
            layout,
            metadata.filters.as_deref(),
            metadata.compressor.as_ref(),
        )?;
        let chunk_key_encoding = ChunkKeyEncoding::new(metadata.dimension_separator);
        Ok(Self {
            data_type,
            codec_chain,
            chunk_key_encoding,
            chunk_grid,
            state: RwLock::new(ArrayState {
                metadata,
                fill_value,
            }),
            cache: Mutex::new(ArrayCache::default()),
        })
    }

    pub(crate) const fn data_type(&self) -> &ExtendedDataType {
        &self.data_type
    }

    pub(crate) const fn codec_chain(&self) -> &CodecChain {
        &self.codec_chain
    }

    pub(crate) const fn chunk_key_encoding(&self) -> &ChunkKeyEncoding {
        &self.chunk_key_encoding
    }

    pub(crate) const fn chunk_grid(&self) -> &RegularChunkGrid {
        &self.chunk_grid
    }

    pub(crate) fn chunk_shape(&self) -> &[u64] {
        self.chunk_grid.chunk_shape()
    }

    /// The size of an element in memory.
    pub(crate) fn element_size(&self) -> usize {
        self.codec_chain.layout().memory_size()
    }

    pub(crate) fn shape(&self) -> ArrayShape {
        self.state.read().metadata.shape.clone()
    }

    pub(crate) fn dimensionality(&self) -> usize {
        self.chunk_grid.chunk_shape().len()
    }

    pub(crate) fn fill_value(&self) -> Option<FillValue> {
        self.state.read().fill_value.clone()
    }

    pub(crate) fn metadata(&self) -> ArrayMetadata {
        self.state.read().metadata.clone()
    }

    /// The metadata of the array with `shape`.
    pub(crate) fn metadata_with_shape(&self, shape: &[u64]) -> ArrayMetadata {
        let mut metadata = self.metadata();
        metadata.shape = shape.to_vec();
        metadata
    }

    /// The metadata of the array with `fill_value`.
    pub(crate) fn metadata_with_fill_value(&self, fill_value: Option<&FillValue>) -> ArrayMetadata {
        let mut metadata = self.metadata();
        metadata.fill_value =
            fill_value_to_metadata(fill_value, &self.data_type, self.codec_chain.layout());
        metadata
    }

    /// Returns true if the chunk grid of an array of `shape` has fewer than 2^64 chunks.
    pub(crate) fn supports_shape(&self, shape: &[u64]) -> bool {
        self.chunk_grid.num_chunks(shape).is_some()
    }

    pub(crate) fn set_shape(&self, shape: ArrayShape) {
        self.state.write().metadata.shape = shape;
    }

    pub(crate) fn set_fill_value(&self, fill_value: Option<FillValue>) {
        let mut state = self.state.write();
        state.metadata.fill_value =
            fill_value_to_metadata(fill_value.as_ref(), &self.data_type, self.codec_chain.layout());
        state.fill_value = fill_value;
    }

    pub(crate) fn cache(&self) -> MutexGuard<'_, ArrayCache> {
        self.cache.lock()
    }

    /// Drop the advised chunks and the tile presence of the array.
    pub(crate) fn invalidate_caches(&self) {
        let mut cache = self.cache.lock();
        cache.advised = None;
        cache.presence = PresenceState::Unknown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::NumericDataType;

    const JSON: &str = r#"{
        "chunks": [2, 3],
        "compressor": null,
        "dtype": ">i2",
        "fill_value": -1,
        "filters": null,
        "order": "C",
        "shape": [4, 5],
        "zarr_format": 2,
        "custom": true
    }"#;

    #[test]
    fn array_core() -> Result<(), Box<dyn std::error::Error>> {
        let core = ArrayCore::new("/a", serde_json::from_str(JSON)?)?;
        assert_eq!(core.data_type(), &ExtendedDataType::from(NumericDataType::Int16));
        assert_eq!(core.shape(), vec![4, 5]);
        assert_eq!(core.chunk_shape(), &[2, 3]);
        assert_eq!(core.element_size(), 2);
        assert_eq!(core.fill_value(), Some(FillValue::from(-1i16)));

        core.set_shape(vec![6, 5]);
        core.set_fill_value(Some(FillValue::from(7i16)));
        let metadata = core.metadata();
        assert_eq!(metadata.shape, vec![6, 5]);
        assert_eq!(metadata.fill_value, 7);
        assert_eq!(metadata.dtype, ">i2");
        assert!(metadata.additional_fields.contains_key("custom"));
        assert!(!core.supports_shape(&[u64::MAX, u64::MAX]));
        Ok(())
    }

    #[test]
    fn array_core_invalid() {
        let json = JSON.replace(r#""fill_value": -1"#, r#""fill_value": 1e10"#);
        assert!(ArrayCore::new("/a", serde_json::from_str(&json).unwrap()).is_err());
        let json = JSON.replace(r#""chunks": [2, 3]"#, r#""chunks": [2, 0]"#);
        assert_eq!(
            ArrayCore::new("/a", serde_json::from_str(&json).unwrap())
                .unwrap_err()
                .to_string(),
            "Invalid content for chunks"
        );
    }
}
