use crate::metadata::{ArrayMetadataOrder, CodecMetadata};

use super::{ArrayShape, ChunkKeySeparator, Endianness, FillValue, TextWidth};

/// Options for the creation of an [`MDArray`](super::MDArray).
///
/// The defaults are:
///  - a chunk shape generated from the array shape: `1` on every dimension but the last two, which are capped to the
///    [block size limit](crate::config::Config#block-size-limit),
///  - no compressor and no filters, so chunks are stored uncompressed,
///  - no fill value, so unwritten elements read as zero,
///  - row-major (`C`) order, little endian elements, and
///  - the `.` chunk key separator.
///
/// For example:
/// ```rust
/// # use mdstore::array::{ArrayCreateOptions, FillValue};
/// # use mdstore::metadata::CodecMetadata;
/// let mut options = ArrayCreateOptions::default();
/// options
///     .chunk_shape(vec![64, 64])
///     .compressor(Some(CodecMetadata::new("zlib", serde_json::Map::new())))
///     .fill_value(Some(FillValue::from(-9999.0f64)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayCreateOptions {
    /// The chunk shape, generated if [`None`].
    pub chunk_shape: Option<ArrayShape>,
    /// The compressor.
    pub compressor: Option<CodecMetadata>,
    /// The filters, applied in order before the compressor.
    pub filters: Vec<CodecMetadata>,
    /// The fill value, in the in-memory representation of the data type.
    pub fill_value: Option<FillValue>,
    /// The order of elements within a chunk.
    pub order: ArrayMetadataOrder,
    /// The byte order of stored elements.
    pub endianness: Endianness,
    /// The text width of a fixed-width string data type, overriding that of the data type.
    pub text_width: Option<TextWidth>,
    /// The separator of chunk keys.
    pub separator: ChunkKeySeparator,
}

impl Default for ArrayCreateOptions {
    fn default() -> Self {
        Self {
            chunk_shape: None,
            compressor: None,
            filters: Vec::new(),
            fill_value: None,
            order: ArrayMetadataOrder::C,
            endianness: Endianness::Little,
            text_width: None,
            separator: ChunkKeySeparator::Dot,
        }
    }
}

impl ArrayCreateOptions {
    /// Set the chunk shape.
    pub fn chunk_shape(&mut self, chunk_shape: ArrayShape) -> &mut Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Set the compressor.
    pub fn compressor(&mut self, compressor: Option<CodecMetadata>) -> &mut Self {
        self.compressor = compressor;
        self
    }

    /// Set the filters.
    pub fn filters(&mut self, filters: Vec<CodecMetadata>) -> &mut Self {
        self.filters = filters;
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: Option<FillValue>) -> &mut Self {
        self.fill_value = fill_value;
        self
    }

    /// Set the order of elements within a chunk.
    pub fn order(&mut self, order: ArrayMetadataOrder) -> &mut Self {
        self.order = order;
        self
    }

    /// Set the byte order of stored elements.
    pub fn endianness(&mut self, endianness: Endianness) -> &mut Self {
        self.endianness = endianness;
        self
    }

    /// Set the text width of a fixed-width string data type.
    pub fn text_width(&mut self, text_width: TextWidth) -> &mut Self {
        self.text_width = Some(text_width);
        self
    }

    /// Set the separator of chunk keys.
    pub fn separator(&mut self, separator: ChunkKeySeparator) -> &mut Self {
        self.separator = separator;
        self
    }
}
